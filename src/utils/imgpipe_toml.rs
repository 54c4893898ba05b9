//! Load `.imgpipe.toml` (CLI only). Lib callers pass [`PipelineOpts`](crate::PipelineOpts) directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::utils::config::PackagePaths;
use crate::{FailurePolicy, Mode, Opts, ProgressStyle};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImgpipeToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsSection {
    input: Option<String>,
    output: Option<String>,
    prefix: Option<String>,
    mode: Option<Mode>,
    threads: Option<usize>,
    capacity: Option<usize>,
    scale: Option<u32>,
    on_error: Option<FailurePolicy>,
    progress: Option<ProgressStyle>,
    compare: Option<bool>,
    verbose: Option<bool>,
}

/// Parse settings from a TOML string.
pub(crate) fn parse_imgpipe_toml(s: &str) -> Result<ImgpipeToml, toml::de::Error> {
    toml::from_str(s)
}

/// Load settings from `explicit` if given, else `.imgpipe.toml` in `dir` if present.
/// `Ok(None)` when there is no default file; `Err` when the named file is unreadable or invalid.
/// Runs before logging is set up, so problems are returned rather than logged.
pub(crate) fn load_imgpipe_toml(dir: &Path, explicit: Option<&Path>) -> Result<Option<ImgpipeToml>> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.join(PackagePaths::get().config_filename()));
    if explicit.is_none() && !path.is_file() {
        return Ok(None);
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("read settings {}", path.display()))?;
    parse_imgpipe_toml(&s)
        .map(Some)
        .with_context(|| format!("parse settings {}", path.display()))
}

/// True if the file asks for verbose output (needed before logging is set up).
pub(crate) fn file_wants_verbose(file: &ImgpipeToml) -> bool {
    file.settings.verbose.unwrap_or(false)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($file:expr, $opts:expr, $file_field:ident => $opts_field:ident) => {
        if let Some(v) = $file.$file_field {
            $opts.$opts_field = v;
        }
    };
}

/// Apply file config to opts (only set fields present in the file). Call before applying CLI.
pub(crate) fn apply_file_to_opts(file: &ImgpipeToml, opts: &mut Opts) {
    let s = &file.settings;
    if let Some(ref p) = s.input {
        opts.input_dir = PathBuf::from(p);
    }
    if let Some(ref p) = s.output {
        opts.output_dir = PathBuf::from(p);
    }
    if let Some(ref p) = s.prefix {
        opts.prefix = Some(p.clone());
    }
    if let Some(n) = s.threads {
        opts.num_threads = Some(n);
    }
    apply_file_opt!(s, opts, mode => mode);
    apply_file_opt!(s, opts, capacity => queue_capacity);
    apply_file_opt!(s, opts, scale => scale_factor);
    apply_file_opt!(s, opts, on_error => on_transform_error);
    apply_file_opt!(s, opts, progress => progress);
    apply_file_opt!(s, opts, compare => compare);
    apply_file_opt!(s, opts, verbose => verbose);
}
