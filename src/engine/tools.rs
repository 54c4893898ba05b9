//! Path helpers for the image directory.

use std::path::{Path, PathBuf};

use crate::ImageId;
use crate::utils::config::INPUT_EXTENSIONS;

/// True if `path` has one of the loadable extensions (case-insensitive).
pub fn has_input_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            INPUT_EXTENSIONS
                .iter()
                .any(|allowed| e.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Output file name for image `id`: `<prefix><id>.png`.
pub fn output_file_name(prefix: &str, id: ImageId) -> String {
    format!("{prefix}{id}.png")
}

pub fn output_path_for(output_dir: &Path, prefix: &str, id: ImageId) -> PathBuf {
    output_dir.join(output_file_name(prefix, id))
}
