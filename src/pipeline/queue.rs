//! Bounded blocking FIFO shared by stage replicas.
//!
//! Built on a `crossbeam_channel::bounded` channel: push parks while full, pop parks while empty,
//! and every wait also watches the run's [`CancelToken`]. Handles are cheap clones; each one holds
//! both channel ends, so the queue lives until its last handle (builder or worker) is dropped.

use crossbeam_channel::{Receiver, Sender, bounded, select};
use std::sync::{Arc, Weak};

use crate::error::QueueError;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::message::Message;

pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    cancel: CancelToken,
    lease: Arc<()>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            cancel: self.cancel.clone(),
            lease: Arc::clone(&self.lease),
        }
    }
}

impl<T> std::fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("handles", &self.handle_count())
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    /// Queue that is never cancelled. Fails on zero capacity.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        Self::with_cancel(capacity, &CancelToken::new())
    }

    /// Queue whose waits abort once `cancel` fires. Fails on zero capacity.
    pub fn with_cancel(capacity: usize, cancel: &CancelToken) -> Result<Self, QueueError> {
        // bounded(0) would be a rendezvous channel, not a buffer.
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let (tx, rx) = bounded(capacity);
        Ok(Self {
            tx,
            rx,
            cancel: cancel.clone(),
            lease: Arc::new(()),
        })
    }

    /// Append `item` at the tail, parking while the queue is full.
    pub fn push(&self, item: T) -> Result<(), QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        select! {
            send(self.tx, item) -> res => res.map_err(|_| QueueError::Disconnected),
            recv(self.cancel.signal()) -> _ => Err(QueueError::Cancelled),
        }
    }

    /// Remove the head item, parking while the queue is empty.
    pub fn pop(&self) -> Result<T, QueueError> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }
        select! {
            recv(self.rx) -> msg => msg.map_err(|_| QueueError::Disconnected),
            recv(self.cancel.signal()) -> _ => Err(QueueError::Cancelled),
        }
    }

    /// Non-blocking push. Hands the item back when full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.tx.try_send(item).map_err(|e| e.into_inner())
    }

    /// Non-blocking pop.
    pub fn try_pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Current occupancy, always in `0..=capacity`.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tx.is_full()
    }

    pub fn capacity(&self) -> usize {
        // Always Some for a bounded channel.
        self.tx.capacity().unwrap_or_default()
    }

    /// Live handles onto this queue, including `self`.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.lease)
    }

    /// Observer that reports when every handle has been dropped, without keeping the queue alive.
    pub fn tracker(&self) -> QueueTracker {
        QueueTracker(Arc::downgrade(&self.lease))
    }
}

#[derive(Clone, Debug)]
pub struct QueueTracker(Weak<()>);

impl QueueTracker {
    /// True once the queue's last handle is gone.
    pub fn is_released(&self) -> bool {
        self.0.strong_count() == 0
    }
}

/// Allocates the inter-stage queues for the thread topology.
pub trait QueueFactory: Send + Sync {
    fn create(
        &self,
        capacity: usize,
        cancel: &CancelToken,
    ) -> Result<BoundedQueue<Message>, QueueError>;
}

/// Plain heap-backed queues.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChannelQueueFactory;

impl QueueFactory for ChannelQueueFactory {
    fn create(
        &self,
        capacity: usize,
        cancel: &CancelToken,
    ) -> Result<BoundedQueue<Message>, QueueError> {
        BoundedQueue::with_cancel(capacity, cancel)
    }
}
