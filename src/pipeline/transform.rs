//! Transform stage worker (scale, pixel-tag): pop, transform, release input, distribute.

use log::{debug, error};

use crate::engine::filters::Transform;
use crate::error::{FilterError, PipelineError, QueueError};
use crate::pipeline::context::{PipelineContext, RunStats};
use crate::pipeline::fanout::{Fanout, StageSummary};
use crate::pipeline::message::{FailedItem, Message};
use crate::pipeline::queue::BoundedQueue;
use crate::{FailurePolicy, ImageId};

/// Run one transform replica.
///
/// `upstream` is the number of producers feeding `input`; each sends exactly one end-of-stream
/// marker, so the worker keeps popping until it has seen all of them. Only then does it close its
/// own outputs, once.
pub fn run_transform_worker(
    input: &BoundedQueue<Message>,
    upstream: usize,
    transform: &dyn Transform,
    mut out: Fanout,
    ctx: &PipelineContext,
) -> Result<StageSummary, QueueError> {
    let mut summary = StageSummary::default();
    let stage = transform.name();
    while summary.sentinels_in < upstream {
        match input.pop()? {
            Message::EndOfStream => summary.sentinels_in += 1,
            Message::Failed(failed) => {
                out.send(Message::Failed(failed))?;
                summary.processed += 1;
            }
            Message::Item(image) => {
                let id = image.id();
                let result = transform.apply(&image);
                drop(image);
                match result {
                    Ok(next) => out.send(Message::Item(next))?,
                    Err(err) => handle_transform_failure(stage, id, err, &mut out, ctx)?,
                }
                summary.processed += 1;
            }
        }
    }
    debug!(
        "{stage}: {} in, all {} upstream producers finished",
        summary.processed, upstream
    );
    summary.sentinels_out = out.close()?;
    Ok(summary)
}

/// Apply the run's failure policy to an image `stage` could not transform.
fn handle_transform_failure(
    stage: &'static str,
    id: ImageId,
    err: FilterError,
    out: &mut Fanout,
    ctx: &PipelineContext,
) -> Result<(), QueueError> {
    error!("{stage}: image {id} failed: {err}");
    match ctx.policy {
        FailurePolicy::Skip => {
            RunStats::bump(&ctx.stats.dropped);
            Ok(())
        }
        FailurePolicy::Forward => out.send(Message::Failed(FailedItem {
            id,
            stage,
            error: err,
        })),
        FailurePolicy::Abort => {
            ctx.fail(PipelineError::Aborted {
                stage,
                id,
                source: err,
            });
            Err(QueueError::Cancelled)
        }
    }
}
