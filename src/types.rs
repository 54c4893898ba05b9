//! Public and internal types for the imgpipe API and pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ImageError;
use crate::utils::config::{QueueConsts, TransformConsts};

/// Bytes per pixel in every [`Image`] buffer (RGBA).
pub const BYTES_PER_PIXEL: usize = 4;

/// Sequence identifier assigned by the load stage. Stable for the image's lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One RGBA pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pixel(pub [u8; BYTES_PER_PIXEL]);

/// Owned raster moved between stages. Not `Clone`: every queue hop is a move.
#[derive(Debug, PartialEq, Eq)]
pub struct Image {
    id: ImageId,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    /// Wrap a flat RGBA buffer. Fails when `pixels.len() != width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImageError> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(BYTES_PER_PIXEL))
            .ok_or(ImageError::TooLarge { width, height })?;
        if pixels.len() != expected {
            return Err(ImageError::BufferSize {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            id: ImageId::default(),
            width,
            height,
            pixels,
        })
    }

    /// Image of `width` x `height` with every pixel set to `fill`.
    pub fn filled(width: u32, height: u32, fill: Pixel) -> Result<Self, ImageError> {
        let count = (width as usize)
            .checked_mul(height as usize)
            .ok_or(ImageError::TooLarge { width, height })?;
        let pixels = fill.0.repeat(count);
        Self::from_rgba(width, height, pixels)
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    /// Builder-style id assignment, used by the load stage.
    pub fn with_id(mut self, id: ImageId) -> Self {
        self.id = id;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let mut px = [0u8; BYTES_PER_PIXEL];
        px.copy_from_slice(&self.pixels[start..start + BYTES_PER_PIXEL]);
        Some(Pixel(px))
    }
}

/// Which execution strategy runs the per-image chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One thread: load, scale, tag, save per image.
    Serial,
    /// Stage replicas on OS threads connected by bounded queues.
    #[default]
    Threads,
    /// Per-image chains as rayon tasks.
    Tasks,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Serial, Mode::Threads, Mode::Tasks];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Serial => "serial",
            Mode::Threads => "threads",
            Mode::Tasks => "tasks",
        }
    }

    /// Output file prefix used when no explicit prefix is configured.
    pub fn default_prefix(&self) -> String {
        format!("{}-", self.as_str())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a transform stage does when its filter fails on an image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log the error, drop the image, keep going.
    #[default]
    Skip,
    /// Log the error and cancel the whole run.
    Abort,
    /// Replace the image with an error marker that reaches the save stage.
    Forward,
}

/// How saved images are reported on the terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStyle {
    /// One `.` per saved image on stdout.
    #[default]
    Dots,
    /// kdam progress bar sized by the input count.
    Bar,
    Quiet,
}

/// Replica count per replicated stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageReplicas {
    pub scale: usize,
    pub pixel: usize,
    pub save: usize,
}

impl StageReplicas {
    /// Same replica count for every stage.
    pub fn uniform(n: usize) -> Self {
        Self {
            scale: n,
            pixel: n,
            save: n,
        }
    }

    /// Threads the topology starts: one loader plus every replica.
    pub fn total_threads(&self) -> usize {
        1 + self.scale + self.pixel + self.save
    }
}

/// Lib-only options for [`process_dir`](crate::process::process_dir) and the `run_*` entry points.
#[derive(Clone, Debug)]
pub struct PipelineOpts {
    pub mode: Mode,
    /// Replica override. When None, derived from available parallelism.
    pub num_threads: Option<usize>,
    /// Capacity of every bounded queue.
    pub queue_capacity: usize,
    /// Integer upscale factor for the scale stage.
    pub scale_factor: u32,
    pub on_transform_error: FailurePolicy,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            num_threads: None,
            queue_capacity: QueueConsts::DEFAULT_CAPACITY,
            scale_factor: TransformConsts::DEFAULT_SCALE_FACTOR,
            on_transform_error: FailurePolicy::default(),
        }
    }
}

impl From<&Opts> for PipelineOpts {
    fn from(o: &Opts) -> Self {
        PipelineOpts {
            mode: o.mode,
            num_threads: o.num_threads,
            queue_capacity: o.queue_capacity,
            scale_factor: o.scale_factor,
            on_transform_error: o.on_transform_error,
        }
    }
}

/// Full options (CLI and compare). Use [`PipelineOpts`] for lib.
#[derive(Clone, Debug)]
pub struct Opts {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Output file prefix. When None, [`Mode::default_prefix`].
    pub prefix: Option<String>,
    pub mode: Mode,
    pub num_threads: Option<usize>,
    pub queue_capacity: usize,
    pub scale_factor: u32,
    pub on_transform_error: FailurePolicy,
    pub progress: ProgressStyle,
    /// Run every mode and print a timing table.
    pub compare: bool,
    pub verbose: bool,
}

impl Default for Opts {
    fn default() -> Self {
        let lib = PipelineOpts::default();
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("out"),
            prefix: None,
            mode: lib.mode,
            num_threads: lib.num_threads,
            queue_capacity: lib.queue_capacity,
            scale_factor: lib.scale_factor,
            on_transform_error: lib.on_transform_error,
            progress: ProgressStyle::default(),
            compare: false,
            verbose: false,
        }
    }
}

impl Opts {
    pub fn prefix_for(&self, mode: Mode) -> String {
        self.prefix.clone().unwrap_or_else(|| mode.default_prefix())
    }
}

/// Counters for one run. `loaded == saved + dropped + failed + save_errors` once the run completes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub mode: Mode,
    pub loaded: usize,
    pub saved: usize,
    /// Images discarded by a transform failure under [`FailurePolicy::Skip`].
    pub dropped: usize,
    /// Error markers that reached the save stage under [`FailurePolicy::Forward`].
    pub failed: usize,
    /// Sink failures (logged, not fatal).
    pub save_errors: usize,
    pub elapsed: Duration,
}

impl PipelineReport {
    /// True when every loaded image was either saved or accounted for.
    pub fn is_balanced(&self) -> bool {
        self.loaded == self.saved + self.dropped + self.failed + self.save_errors
    }
}
