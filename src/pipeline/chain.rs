//! The per-image chain (scale, tag, save) run inline by the serial and task runners.

use log::{error, warn};
use std::time::Instant;

use crate::engine::filters::Transform;
use crate::engine::progress::ProgressFn;
use crate::error::PipelineError;
use crate::pipeline::context::{ImageSink, PipelineContext, RunStats};
use crate::pipeline::error_handler::report_unsaved;
use crate::{FailurePolicy, Image, Mode, PipelineReport};

pub(crate) struct Chain<'a> {
    pub scale: &'a dyn Transform,
    pub tag: &'a dyn Transform,
    pub sink: &'a dyn ImageSink,
    pub progress: &'a ProgressFn,
}

impl Chain<'_> {
    /// Scale, tag and save one image. `Err` only when the run must stop.
    pub fn process(&self, image: Image, ctx: &PipelineContext) -> Result<(), PipelineError> {
        let Some(image) = self.step(self.scale, image, ctx)? else {
            return Ok(());
        };
        let Some(image) = self.step(self.tag, image, ctx)? else {
            return Ok(());
        };
        match self.sink.save(&image) {
            Ok(()) => {
                RunStats::bump(&ctx.stats.saved);
                (self.progress)(1);
            }
            Err(e) => {
                warn!("save: image {} failed to persist: {:#}", image.id(), e);
                RunStats::bump(&ctx.stats.save_errors);
            }
        }
        Ok(())
    }

    /// Apply `transform`, releasing the input before returning. `None` means the image left the
    /// chain under the skip or forward policy.
    fn step(
        &self,
        transform: &dyn Transform,
        image: Image,
        ctx: &PipelineContext,
    ) -> Result<Option<Image>, PipelineError> {
        let id = image.id();
        let result = transform.apply(&image);
        drop(image);
        let err = match result {
            Ok(next) => return Ok(Some(next)),
            Err(err) => err,
        };
        let stage = transform.name();
        error!("{stage}: image {id} failed: {err}");
        match ctx.policy {
            FailurePolicy::Skip => {
                RunStats::bump(&ctx.stats.dropped);
                Ok(None)
            }
            FailurePolicy::Forward => {
                warn!("save: image {id} not saved, {stage} stage failed: {err}");
                RunStats::bump(&ctx.stats.failed);
                Ok(None)
            }
            FailurePolicy::Abort => {
                ctx.fail(PipelineError::Aborted {
                    stage,
                    id,
                    source: err,
                });
                Err(PipelineError::Cancelled)
            }
        }
    }
}

/// Turn an inline runner's result into the run's report, preferring a recorded fatal error.
pub(crate) fn finish_run(
    ctx: &PipelineContext,
    result: Result<(), PipelineError>,
    mode: Mode,
    start: Instant,
) -> Result<PipelineReport, PipelineError> {
    if let Some(err) = ctx.take_first_error() {
        return Err(err);
    }
    result?;
    if ctx.cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }
    let report = ctx.stats.snapshot(mode, start.elapsed());
    report_unsaved(&report);
    Ok(report)
}
