//! Directory processing: PNGs in, scaled and tagged PNGs out.

use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use crate::engine::image_dir::ImageDir;
use crate::engine::progress::RunProgress;
use crate::pipeline::cancel::CancelToken;
use crate::pipeline::context::PipelineParts;
use crate::{PipelineOpts, PipelineReport, ProgressStyle, run_pipeline};

/// Run `opts.mode` over every image in `input_dir`, writing `<prefix><id>.png` into `output_dir`.
/// Progress is printed in `progress` style; `cancel` stops the run early (e.g. from Ctrl+C).
pub fn process_dir(
    input_dir: &Path,
    output_dir: &Path,
    prefix: &str,
    opts: &PipelineOpts,
    progress: ProgressStyle,
    cancel: &CancelToken,
) -> Result<PipelineReport> {
    let dir = ImageDir::open(input_dir, output_dir, prefix)?;
    let total = dir.len();
    info!(
        "{}: {} images from {} into {}",
        opts.mode,
        total,
        input_dir.display(),
        output_dir.display()
    );

    let run_progress = RunProgress::new(progress, total, opts.mode.as_str());
    let (source, sink) = dir.split();
    let parts = PipelineParts::new(source, sink, opts.scale_factor)
        .with_progress(run_progress.callback.clone());

    let result = run_pipeline(parts, opts, cancel);
    run_progress.finish(result.as_ref().map(|r| r.saved).unwrap_or(0));
    let report =
        result.with_context(|| format!("{} run over {}", opts.mode, input_dir.display()))?;

    info!(
        "{}: saved {} of {} images in {:.2?}",
        report.mode, report.saved, report.loaded, report.elapsed
    );
    Ok(report)
}
