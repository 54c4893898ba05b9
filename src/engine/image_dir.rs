//! PNG directory source and sink.
//!
//! [`ImageDir::open`] scans the input directory once (depth 1, sorted by file name) and splits
//! into a [`DirSource`] for the load stage and a [`DirSink`] shared by the save stage.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::Image;
use crate::engine::tools::{has_input_extension, output_path_for};
use crate::pipeline::context::ImageSink;

pub struct ImageDir {
    inputs: Vec<PathBuf>,
    output_dir: PathBuf,
    prefix: String,
}

impl ImageDir {
    /// Scan `input_dir` for images and make sure `output_dir` exists.
    pub fn open(input_dir: &Path, output_dir: &Path, prefix: &str) -> Result<Self> {
        if !input_dir.is_dir() {
            anyhow::bail!("input is not a directory: {}", input_dir.display());
        }
        let mut inputs = Vec::new();
        for entry in WalkDir::new(input_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.with_context(|| format!("scan {}", input_dir.display()))?;
            if entry.file_type().is_file() && has_input_extension(entry.path()) {
                inputs.push(entry.into_path());
            }
        }
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("create output dir {}", output_dir.display()))?;
        debug!(
            "{} input images in {}",
            inputs.len(),
            input_dir.display()
        );
        Ok(Self {
            inputs,
            output_dir: output_dir.to_path_buf(),
            prefix: prefix.to_string(),
        })
    }

    /// Number of input files found (some may still fail to decode).
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn split(self) -> (DirSource, DirSink) {
        (
            DirSource {
                pending: self.inputs.into_iter(),
            },
            DirSink {
                output_dir: self.output_dir,
                prefix: self.prefix,
            },
        )
    }
}

/// Decodes inputs in order. Files that fail to decode are logged and skipped.
pub struct DirSource {
    pending: std::vec::IntoIter<PathBuf>,
}

impl Iterator for DirSource {
    type Item = Image;

    fn next(&mut self) -> Option<Image> {
        for path in self.pending.by_ref() {
            match load_png(&path) {
                Ok(image) => return Some(image),
                Err(e) => warn!("skipping {}: {:#}", path.display(), e),
            }
        }
        None
    }
}

/// Writes `<output_dir>/<prefix><id>.png`.
pub struct DirSink {
    output_dir: PathBuf,
    prefix: String,
}

impl DirSink {
    pub fn path_for(&self, image: &Image) -> PathBuf {
        output_path_for(&self.output_dir, &self.prefix, image.id())
    }
}

impl ImageSink for DirSink {
    fn save(&self, image: &Image) -> Result<()> {
        save_png(image, &self.path_for(image))
    }
}

/// Decode any supported file into an RGBA image (id left at 0 for the load stage to assign).
pub fn load_png(path: &Path) -> Result<Image> {
    let rgba = image::open(path)
        .with_context(|| format!("decode {}", path.display()))?
        .into_rgba8();
    let (width, height) = rgba.dimensions();
    Image::from_rgba(width, height, rgba.into_raw()).context("wrap decoded pixels")
}

/// Encode `image` as PNG at `path`.
pub fn save_png(image: &Image, path: &Path) -> Result<()> {
    image::save_buffer_with_format(
        path,
        image.pixels(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("encode {}", path.display()))
}
