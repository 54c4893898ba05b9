//! Serial runner: the whole chain on the calling thread, one image at a time.

use log::info;
use std::time::Instant;

use crate::error::PipelineError;
use crate::pipeline::chain::{Chain, finish_run};
use crate::pipeline::context::{PipelineContext, PipelineParts, RunStats};
use crate::{ImageId, Mode, PipelineReport};

pub fn run_serial(
    parts: PipelineParts,
    ctx: &PipelineContext,
) -> Result<PipelineReport, PipelineError> {
    let start = Instant::now();
    info!("Serial run");
    let PipelineParts {
        mut source,
        sink,
        scale,
        tag,
        progress,
    } = parts;
    let chain = Chain {
        scale: scale.as_ref(),
        tag: tag.as_ref(),
        sink: sink.as_ref(),
        progress: &progress,
    };

    let mut next_id = 0_u64;
    let mut result = Ok(());
    while let Some(image) = source.load_next() {
        if ctx.cancel.is_cancelled() {
            result = Err(PipelineError::Cancelled);
            break;
        }
        let image = image.with_id(ImageId(next_id));
        next_id += 1;
        RunStats::bump(&ctx.stats.loaded);
        if let Err(e) = chain.process(image, ctx) {
            result = Err(e);
            break;
        }
    }
    finish_run(ctx, result, Mode::Serial, start)
}
