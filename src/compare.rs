//! Run every execution mode over the same input and compare wall-clock time.

use anyhow::Result;
use colored::Colorize;
use log::debug;

use crate::pipeline::cancel::CancelToken;
use crate::process::process_dir;
use crate::{Mode, Opts, PipelineOpts, PipelineReport};

/// Run serial, threads and tasks in turn (each with its own output prefix) and print a table.
pub fn compare_modes(opts: &Opts, cancel: &CancelToken) -> Result<Vec<PipelineReport>> {
    let mut reports = Vec::with_capacity(Mode::ALL.len());
    for mode in Mode::ALL {
        let mut lib = PipelineOpts::from(opts);
        lib.mode = mode;
        debug!("Comparing mode {}", mode);
        let report = process_dir(
            &opts.input_dir,
            &opts.output_dir,
            &opts.prefix_for(mode),
            &lib,
            opts.progress,
            cancel,
        )?;
        reports.push(report);
    }
    print_comparison(&reports);
    Ok(reports)
}

/// Speedup of `report` relative to `baseline` (> 1.0 is faster).
pub fn speedup(baseline: &PipelineReport, report: &PipelineReport) -> f64 {
    let t = report.elapsed.as_secs_f64();
    if t == 0.0 {
        return 0.0;
    }
    baseline.elapsed.as_secs_f64() / t
}

fn print_comparison(reports: &[PipelineReport]) {
    let Some(baseline) = reports.iter().find(|r| r.mode == Mode::Serial) else {
        return;
    };
    println!(
        "{:<8} {:>7} {:>10} {:>8}",
        "mode".bold(),
        "saved".bold(),
        "time".bold(),
        "speedup".bold()
    );
    for r in reports {
        let factor = format!("{:.2}x", speedup(baseline, r));
        let factor = if r.mode == Mode::Serial {
            factor.normal()
        } else if speedup(baseline, r) >= 1.0 {
            factor.green()
        } else {
            factor.red()
        };
        println!(
            "{:<8} {:>7} {:>10} {:>8}",
            r.mode.as_str().cyan(),
            r.saved,
            format!("{:.2?}", r.elapsed),
            factor
        );
    }
}
