//! Progress reporting for saved images: dots on stdout, a kdam bar, or nothing.

use kdam::{Animation, Bar, BarExt};
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::ProgressStyle;

/// Called by save workers with the number of images just saved.
pub type ProgressFn = Arc<dyn Fn(usize) + Send + Sync>;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Configuration for creating a progress bar
pub struct ProgressBarConfig {
    pub total: usize,
    pub desc: String,
    pub animation: Animation,
}

impl ProgressBarConfig {
    /// Create a new progress bar configuration
    pub fn new(total: usize, desc: impl Into<String>, animation: Animation) -> Self {
        Self {
            total,
            desc: desc.into(),
            animation,
        }
    }
}

/// Create a progress bar with the given configuration
pub fn create_progress_bar(config: ProgressBarConfig) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = config.total,
        desc = config.desc,
        animation = config.animation,
        unit = " img"
    )))
}

/// Update progress bar if available
/// Uses try_lock to avoid blocking if mutex is contended (non-blocking)
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    // Save replicas call this concurrently; a missed update is fine, the bar is refreshed on finish.
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Progress callback that does nothing.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// One `.` per saved image, flushed immediately so interactive runs show liveness.
pub fn dots_callback() -> ProgressFn {
    Arc::new(|n: usize| {
        let mut out = std::io::stdout().lock();
        for _ in 0..n {
            let _ = out.write_all(b".");
        }
        let _ = out.flush();
    })
}

/// Progress output for one run: the callback for save workers plus the bar (if any) to finish.
pub struct RunProgress {
    pub style: ProgressStyle,
    pub callback: ProgressFn,
    bar: Option<ProgressBar>,
}

impl RunProgress {
    /// `total` is the number of inputs (bar length); `desc` labels the bar.
    pub fn new(style: ProgressStyle, total: usize, desc: &str) -> Self {
        match style {
            ProgressStyle::Dots => Self {
                style,
                callback: dots_callback(),
                bar: None,
            },
            ProgressStyle::Bar => {
                let bar = create_progress_bar(ProgressBarConfig::new(
                    total,
                    desc,
                    Animation::Classic,
                ));
                let cb_bar = Arc::clone(&bar);
                Self {
                    style,
                    callback: Arc::new(move |n: usize| update_progress_bar(&cb_bar, n)),
                    bar: Some(bar),
                }
            }
            ProgressStyle::Quiet => Self {
                style,
                callback: no_progress(),
                bar: None,
            },
        }
    }

    /// End the progress line: newline after dots, final refresh for the bar.
    pub fn finish(&self, saved: usize) {
        match (self.style, &self.bar) {
            (ProgressStyle::Dots, _) => println!(),
            (ProgressStyle::Bar, Some(bar)) => {
                if let Ok(mut bar) = bar.lock() {
                    // try_lock updates may have been skipped under contention.
                    bar.counter = saved;
                    let _ = bar.refresh();
                    eprintln!();
                }
            }
            _ => {}
        }
    }
}
