use clap::Parser;
use std::path::PathBuf;

use crate::{FailurePolicy, Mode, ProgressStyle};

/// Multi-stage image pipeline over bounded queues.
#[derive(Clone, Parser)]
#[command(name = "imgpipe")]
#[command(about = "Scale up and tag every PNG in a directory, serially, on stage threads, or as tasks.")]
pub struct Cli {
    /// Directory of input PNGs. Default: current directory.
    #[arg(value_name = "INPUT")]
    pub input: Option<PathBuf>,

    /// Directory for output PNGs, created if missing. Default: `out`.
    #[arg(value_name = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Execution strategy.
    #[arg(long, short = 'm', value_enum)]
    pub mode: Option<Mode>,

    /// Run every mode over the same input and print a timing table.
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub compare: Option<bool>,

    /// Replicas per stage (threads mode) or pool size (tasks mode). Default: derived from cores.
    #[arg(long, short = 't')]
    pub threads: Option<usize>,

    /// Capacity of every inter-stage queue.
    #[arg(long, short = 'q')]
    pub capacity: Option<usize>,

    /// Integer upscale factor.
    #[arg(long, short = 's')]
    pub scale: Option<u32>,

    /// What to do when a filter fails on an image.
    #[arg(long, value_enum)]
    pub on_error: Option<FailurePolicy>,

    /// Progress output.
    #[arg(long, short = 'p', value_enum)]
    pub progress: Option<ProgressStyle>,

    /// Output file prefix. Default: `<mode>-`.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Settings file. Default: `.imgpipe.toml` in the current directory, if present.
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
