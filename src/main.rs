//! Imgpipe CLI: scale and tag every PNG in a directory; --compare times all modes.

use anyhow::Result;
use clap::Parser;
use imgpipe::engine::arg_parser::Cli;
use imgpipe::engine::handle_run;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
