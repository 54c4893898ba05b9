//! Shared helpers for parallel processing.

use log::debug;

use crate::Mode;

pub fn mode_handler(mode: Mode, replicas: usize) {
    match mode {
        Mode::Serial => debug!("Running serially"),
        Mode::Threads => debug!("Running stage threads, {} replicas per stage", replicas),
        Mode::Tasks => debug!("Running rayon tasks on {} threads", replicas),
    }
}
