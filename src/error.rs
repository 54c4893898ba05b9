//! Typed errors for the pipeline core. The CLI layer wraps these in `anyhow`.

use thiserror::Error;

use crate::ImageId;

/// Failure building an [`Image`](crate::Image) from raw parts.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ImageError {
    #[error("image dimensions {width}x{height} overflow the address space")]
    TooLarge { width: u32, height: u32 },

    #[error("pixel buffer has {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// A filter could not produce an output image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("scale factor must be at least 1")]
    ZeroFactor,

    #[error("cannot filter an empty {width}x{height} image")]
    EmptyImage { width: u32, height: u32 },

    #[error("scaled size of {width}x{height} by {factor} overflows")]
    Overflow { width: u32, height: u32, factor: u32 },

    #[error("{0}")]
    Other(String),
}

/// A blocking queue operation did not complete.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("queue allocation failed")]
    AllocationFailed,

    /// Every handle on the other side is gone.
    #[error("queue disconnected")]
    Disconnected,

    #[error("queue operation cancelled")]
    Cancelled,
}

/// Errors returned by the pipeline runners.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Queue or thread creation failed; no image was processed.
    #[error("pipeline setup failed: {0}")]
    Setup(String),

    /// A transform failed under [`FailurePolicy::Abort`](crate::FailurePolicy::Abort).
    #[error("aborted: {stage} failed on image {id}: {source}")]
    Aborted {
        stage: &'static str,
        id: ImageId,
        #[source]
        source: FilterError,
    },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("{0} thread panicked")]
    WorkerPanicked(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
