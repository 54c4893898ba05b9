//! Out-of-band stop signal observed at every queue wait.
//!
//! The token owns the only sender of a zero-capacity channel. Cancelling drops that sender, so the
//! receiver becomes disconnected and every `select!` parked on it wakes immediately.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Clone, Debug)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    signal: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded::<()>(0);
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            trigger: Arc::new(Mutex::new(Some(tx))),
            signal: rx,
        }
    }

    /// Wake every waiter and make all later queue operations fail with `Cancelled`. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.trigger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Receiver that only ever becomes ready (disconnected) once [`cancel`](Self::cancel) runs.
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.signal
    }
}

/// Cancels the token if the owning thread unwinds, so a panicking worker can't leave its
/// neighbours parked on a queue that will never see another sentinel.
pub(crate) struct CancelOnPanic(pub CancelToken);

impl Drop for CancelOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.cancel();
        }
    }
}
