//! Imgpipe: multi-stage image pipeline (load, scale, tag, save) over bounded queues

pub mod compare;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use engine::filters::{AddTagPixel, ScaleUp, Transform};
pub use error::{FilterError, ImageError, PipelineError, QueueError};
pub use pipeline::{BoundedQueue, CancelToken, ImageSink, ImageSource, PipelineParts};

use log::debug;

use engine::parallel::mode_handler;
use pipeline::context::PipelineContext;
use pipeline::orchestrator::run_threaded;
use pipeline::queue::ChannelQueueFactory;
use pipeline::serial::run_serial;
use pipeline::tasks::run_tasks;
use pipeline::tuning::{PipelineTuning, determine_replicas};
use utils::config::ReplicaLimits;

/// Result alias used by public imgpipe API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: run `parts` through scale, tag and save in `opts.mode`.
///
/// - **`Mode::Serial`** → the whole chain on the calling thread.
/// - **`Mode::Threads`** → one loader plus replicated scale, pixel and save threads joined by
///   bounded queues of `opts.queue_capacity`.
/// - **`Mode::Tasks`** → one rayon task per image on a dedicated pool.
///
/// `cancel` stops any mode early; the run then returns [`PipelineError::Cancelled`] (or the
/// first abort error under [`FailurePolicy::Abort`]).
pub fn run_pipeline(
    parts: PipelineParts,
    opts: &PipelineOpts,
    cancel: &CancelToken,
) -> std::result::Result<PipelineReport, PipelineError> {
    let config_str = format!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_string().to_uppercase(),
        opts
    );
    debug!("{}", config_str);

    let ctx = PipelineContext::new(opts.on_transform_error, cancel);
    match opts.mode {
        Mode::Serial => {
            mode_handler(Mode::Serial, 1);
            run_serial(parts, &ctx)
        }
        Mode::Threads => {
            let tuning = PipelineTuning::detect(opts.num_threads, opts.queue_capacity);
            mode_handler(Mode::Threads, tuning.replicas.scale);
            run_threaded(parts, &tuning, &ctx, &ChannelQueueFactory).map(|run| run.report)
        }
        Mode::Tasks => {
            let threads = tuning_for_threads(None, opts.num_threads);
            mode_handler(Mode::Tasks, threads);
            run_tasks(parts, threads, &ctx)
        }
    }
}

/// Replicas per stage (and task pool size) for `available_threads`, or for this machine when
/// `None`. Set the result as `num_threads` on [`PipelineOpts`] to pin it across runs:
///
/// ```ignore
/// let n = imgpipe::tuning_for_threads(Some(8), None);
/// let opts = PipelineOpts { num_threads: Some(n), ..Default::default() };
/// ```
pub fn tuning_for_threads(available_threads: Option<usize>, thread_override: Option<usize>) -> usize {
    let limits = ReplicaLimits {
        all_threads: available_threads.unwrap_or_else(rayon::current_num_threads),
        ..ReplicaLimits::default()
    };
    determine_replicas(&limits, thread_override)
}
