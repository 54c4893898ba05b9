use log::warn;

use crate::PipelineReport;
use crate::error::{PipelineError, QueueError};
use crate::pipeline::context::PipelineContext;

/// How one worker ended, as seen by the thread that joined it.
pub enum WorkerExit {
    Finished,
    Failed { name: String, err: QueueError },
    Panicked { name: String },
}

/// Decide the run's result after every worker is joined.
/// Precedence: recorded fatal error (abort policy), then panics, then cancellation, then queue errors.
pub fn resolve_run_outcome(ctx: &PipelineContext, exits: &[WorkerExit]) -> Result<(), PipelineError> {
    if let Some(err) = ctx.take_first_error() {
        return Err(err);
    }
    if let Some(name) = exits.iter().find_map(|e| match e {
        WorkerExit::Panicked { name } => Some(name.clone()),
        _ => None,
    }) {
        return Err(PipelineError::WorkerPanicked(name));
    }
    if ctx.cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    if let Some((name, err)) = exits.iter().find_map(|e| match e {
        WorkerExit::Failed { name, err } => Some((name, *err)),
        _ => None,
    }) {
        warn!("{} exited early: {}", name, err);
        return Err(PipelineError::Queue(err));
    }
    Ok(())
}

/// Log images that did not make it to the sink. Call once the run succeeded.
pub fn report_unsaved(report: &PipelineReport) {
    if report.dropped > 0 {
        warn!(
            "Dropped {} images after transform failures",
            report.dropped
        );
    }
    if report.failed > 0 {
        warn!("{} images reached the sink as failure markers", report.failed);
    }
    if report.save_errors > 0 {
        warn!("{} images failed to save", report.save_errors);
    }
    if !report.is_balanced() {
        warn!(
            "Unbalanced run: loaded {} but accounted for {}",
            report.loaded,
            report.saved + report.dropped + report.failed + report.save_errors
        );
    }
}
