//! CLI command handler: resolve settings, install Ctrl+C, run one mode or compare all.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::Path;

use crate::compare::compare_modes;
use crate::engine::arg_parser::Cli;
use crate::pipeline::cancel::CancelToken;
use crate::process::process_dir;
use crate::utils::imgpipe_toml::{apply_file_to_opts, file_wants_verbose, load_imgpipe_toml};
use crate::utils::setup_logging;
use crate::{Opts, PipelineOpts};

/// Overwrite opts with every flag given on the command line.
fn apply_cli_to_opts(cli: &Cli, opts: &mut Opts) {
    if let Some(ref p) = cli.input {
        opts.input_dir = p.clone();
    }
    if let Some(ref p) = cli.output {
        opts.output_dir = p.clone();
    }
    if let Some(ref p) = cli.prefix {
        opts.prefix = Some(p.clone());
    }
    if let Some(n) = cli.threads {
        opts.num_threads = Some(n);
    }
    if let Some(m) = cli.mode {
        opts.mode = m;
    }
    if let Some(c) = cli.capacity {
        opts.queue_capacity = c;
    }
    if let Some(s) = cli.scale {
        opts.scale_factor = s;
    }
    if let Some(p) = cli.on_error {
        opts.on_transform_error = p;
    }
    if let Some(p) = cli.progress {
        opts.progress = p;
    }
    if let Some(c) = cli.compare {
        opts.compare = c;
    }
    if let Some(v) = cli.verbose {
        opts.verbose = v;
    }
}

/// Defaults, then the settings file, then CLI flags. Sets up logging once verbosity is known.
fn setup_opts(cli: &Cli) -> Opts {
    let file = load_imgpipe_toml(Path::new("."), cli.config.as_deref());
    let file_verbose = matches!(&file, Ok(Some(f)) if file_wants_verbose(f));
    setup_logging(cli.verbose.unwrap_or(file_verbose));

    let mut opts = Opts::default();
    match file {
        Ok(Some(f)) => apply_file_to_opts(&f, &mut opts),
        Ok(None) => {}
        Err(e) => warn!("Ignoring settings file: {:#}", e),
    }
    apply_cli_to_opts(cli, &mut opts);
    debug!("{} CONFIG:{:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);
    opts
}

/// Run the configured mode, or every mode with --compare.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let opts = setup_opts(cli);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("set Ctrl+C handler")?;

    if opts.compare {
        compare_modes(&opts, &cancel)?;
    } else {
        let lib = PipelineOpts::from(&opts);
        process_dir(
            &opts.input_dir,
            &opts.output_dir,
            &opts.prefix_for(opts.mode),
            &lib,
            opts.progress,
            &cancel,
        )?;
    }
    Ok(())
}
