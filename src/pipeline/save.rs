//! Save stage: terminal sink. Persists, reports progress, releases.

use log::{debug, warn};

use crate::engine::progress::ProgressFn;
use crate::error::QueueError;
use crate::pipeline::context::{ImageSink, PipelineContext, RunStats};
use crate::pipeline::fanout::StageSummary;
use crate::pipeline::message::Message;
use crate::pipeline::queue::BoundedQueue;

/// Run one save replica until all `upstream` producers have sent their end-of-stream marker.
/// Sink failures are logged and counted; the worker keeps going.
pub fn run_save_worker(
    input: &BoundedQueue<Message>,
    upstream: usize,
    sink: &dyn ImageSink,
    progress: &ProgressFn,
    ctx: &PipelineContext,
) -> Result<StageSummary, QueueError> {
    let mut summary = StageSummary::default();
    while summary.sentinels_in < upstream {
        match input.pop()? {
            Message::EndOfStream => summary.sentinels_in += 1,
            Message::Failed(failed) => {
                warn!(
                    "save: image {} not saved, {} stage failed: {}",
                    failed.id, failed.stage, failed.error
                );
                RunStats::bump(&ctx.stats.failed);
                summary.processed += 1;
            }
            Message::Item(image) => {
                match sink.save(&image) {
                    Ok(()) => {
                        RunStats::bump(&ctx.stats.saved);
                        progress(1);
                    }
                    Err(e) => {
                        warn!("save: image {} failed to persist: {:#}", image.id(), e);
                        RunStats::bump(&ctx.stats.save_errors);
                    }
                }
                drop(image);
                summary.processed += 1;
            }
        }
    }
    debug!("save: {} handled", summary.processed);
    Ok(summary)
}
