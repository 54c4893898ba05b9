//! Pipeline context: the collaborators a run talks to and the state its workers share.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::engine::filters::{AddTagPixel, ScaleUp, Transform};
use crate::engine::progress::{ProgressFn, no_progress};
use crate::error::PipelineError;
use crate::pipeline::cancel::CancelToken;
use crate::{FailurePolicy, Image, Mode, PipelineReport};

/// Where images come from. Only the load stage calls this, and never again after `None`.
pub trait ImageSource: Send {
    fn load_next(&mut self) -> Option<Image>;
}

impl<I> ImageSource for I
where
    I: Iterator<Item = Image> + Send,
{
    fn load_next(&mut self) -> Option<Image> {
        self.next()
    }
}

/// Where finished images go. Shared by every save replica.
pub trait ImageSink: Send + Sync {
    fn save(&self, image: &Image) -> crate::Result<()>;
}

impl<F> ImageSink for F
where
    F: Fn(&Image) -> crate::Result<()> + Send + Sync,
{
    fn save(&self, image: &Image) -> crate::Result<()> {
        self(image)
    }
}

/// Everything one run needs from the outside: source, sink, the two transforms, progress.
pub struct PipelineParts {
    pub source: Box<dyn ImageSource>,
    pub sink: Arc<dyn ImageSink>,
    pub scale: Arc<dyn Transform>,
    pub tag: Arc<dyn Transform>,
    pub progress: ProgressFn,
}

impl PipelineParts {
    /// Default transforms ([`ScaleUp`] by `scale_factor`, [`AddTagPixel`]) and no progress output.
    pub fn new(
        source: impl ImageSource + 'static,
        sink: impl ImageSink + 'static,
        scale_factor: u32,
    ) -> Self {
        Self {
            source: Box::new(source),
            sink: Arc::new(sink),
            scale: Arc::new(ScaleUp {
                factor: scale_factor,
            }),
            tag: Arc::new(AddTagPixel),
            progress: no_progress(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_scale(mut self, scale: impl Transform + 'static) -> Self {
        self.scale = Arc::new(scale);
        self
    }

    pub fn with_tag(mut self, tag: impl Transform + 'static) -> Self {
        self.tag = Arc::new(tag);
        self
    }
}

/// Counters updated by workers while a run is in flight.
#[derive(Debug, Default)]
pub struct RunStats {
    pub loaded: AtomicUsize,
    pub saved: AtomicUsize,
    pub dropped: AtomicUsize,
    pub failed: AtomicUsize,
    pub save_errors: AtomicUsize,
}

impl RunStats {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, mode: Mode, elapsed: Duration) -> PipelineReport {
        PipelineReport {
            mode,
            loaded: self.loaded.load(Ordering::Relaxed),
            saved: self.saved.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            save_errors: self.save_errors.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

/// Shared state handed to every worker of one run. Clones share the same counters and token.
#[derive(Clone, Debug)]
pub struct PipelineContext {
    pub policy: FailurePolicy,
    pub cancel: CancelToken,
    pub stats: Arc<RunStats>,
    /// First fatal error (abort policy); later ones are only logged.
    pub first_error: Arc<Mutex<Option<PipelineError>>>,
}

impl PipelineContext {
    pub fn new(policy: FailurePolicy, cancel: &CancelToken) -> Self {
        Self {
            policy,
            cancel: cancel.clone(),
            stats: Arc::new(RunStats::default()),
            first_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Record `err` if it is the first fatal error, then cancel the run.
    pub fn fail(&self, err: PipelineError) {
        let mut slot = self
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(err);
        } else {
            log::debug!("Ignoring later fatal error: {}", err);
        }
        drop(slot);
        self.cancel.cancel();
    }

    pub fn take_first_error(&self) -> Option<PipelineError> {
        self.first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
