//! Load stage: pull from the source, tag ids, distribute round-robin.

use log::debug;

use crate::ImageId;
use crate::error::QueueError;
use crate::pipeline::context::{ImageSource, PipelineContext, RunStats};
use crate::pipeline::fanout::{Fanout, StageSummary};
use crate::pipeline::message::Message;

/// Run the single load worker until the source is exhausted, then close every output.
/// Ids start at 0 and increase by one per image; this worker is their only writer.
pub fn run_load_worker(
    source: &mut dyn ImageSource,
    mut out: Fanout,
    ctx: &PipelineContext,
) -> Result<StageSummary, QueueError> {
    let mut summary = StageSummary::default();
    let mut next_id = 0_u64;
    while let Some(image) = source.load_next() {
        let image = image.with_id(ImageId(next_id));
        next_id += 1;
        RunStats::bump(&ctx.stats.loaded);
        out.send(Message::Item(image))?;
        summary.processed += 1;
    }
    debug!("load: source exhausted after {} images", summary.processed);
    summary.sentinels_out = out.close()?;
    Ok(summary)
}
