//! Round-robin distribution over a stage's output queues.

use std::sync::Arc;

use crate::error::QueueError;
use crate::pipeline::message::Message;
use crate::pipeline::queue::BoundedQueue;

/// Output side of one worker: the stage's shared output queues plus this worker's private cursor.
pub struct Fanout {
    outputs: Arc<[BoundedQueue<Message>]>,
    cursor: usize,
}

impl Fanout {
    /// `start` offsets the cursor so sibling replicas don't all begin on queue 0.
    pub fn new(outputs: Arc<[BoundedQueue<Message>]>, start: usize) -> Self {
        Self { outputs, cursor: start }
    }

    pub fn width(&self) -> usize {
        self.outputs.len()
    }

    /// Push to `outputs[cursor % F]`, then advance the cursor.
    pub fn send(&mut self, msg: Message) -> Result<(), QueueError> {
        if self.outputs.is_empty() {
            return Err(QueueError::Disconnected);
        }
        let idx = self.cursor % self.outputs.len();
        self.cursor = self.cursor.wrapping_add(1);
        self.outputs[idx].push(msg)
    }

    /// Push one end-of-stream marker to every output. Consumes the fanout so it can't run twice.
    pub fn close(self) -> Result<usize, QueueError> {
        for queue in self.outputs.iter() {
            queue.push(Message::EndOfStream)?;
        }
        Ok(self.outputs.len())
    }
}

/// What one worker did before exiting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageSummary {
    /// Messages handled (images transformed or saved, markers forwarded).
    pub processed: usize,
    /// End-of-stream markers received on the input queue.
    pub sentinels_in: usize,
    /// End-of-stream markers pushed downstream.
    pub sentinels_out: usize,
}
