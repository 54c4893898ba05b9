//! Task runner: per-image chains scheduled on a rayon pool.
//!
//! The source is still drained by one thread at a time (`par_bridge` serializes `next`), so ids
//! stay sequential; scale, tag and save run as independent tasks.

use log::info;
use rayon::prelude::*;
use std::time::Instant;

use crate::error::PipelineError;
use crate::pipeline::chain::{Chain, finish_run};
use crate::pipeline::context::{PipelineContext, PipelineParts, RunStats};
use crate::{ImageId, Mode, PipelineReport};

pub fn run_tasks(
    parts: PipelineParts,
    num_threads: usize,
    ctx: &PipelineContext,
) -> Result<PipelineReport, PipelineError> {
    let start = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads.max(1))
        .thread_name(|i| format!("task-{i}"))
        .build()
        .map_err(|e| PipelineError::Setup(format!("rayon pool: {e}")))?;
    info!("Task run on {} threads", pool.current_num_threads());

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
    let images = std::iter::from_fn(|| {
        if ctx.cancel.is_cancelled() {
            return None;
        }
        let image = source.load_next()?.with_id(ImageId(next_id));
        next_id += 1;
        RunStats::bump(&ctx.stats.loaded);
        Some(image)
    })
    .fuse();

    let result = pool.install(|| {
        images
            .par_bridge()
            .try_for_each(|image| chain.process(image, ctx))
    });
    finish_run(ctx, result, Mode::Tasks, start)
}
