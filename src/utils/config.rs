//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// Name of the optional settings file looked up in the working directory.
    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }
}

// ---- Worker threads ----

/// Bounds for the per-stage replica count.
/// Use [`ReplicaLimits::current()`] to fill `all_threads` from rayon; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct ReplicaLimits {
    /// Available threads (from rayon); set by [`ReplicaLimits::current()`].
    pub all_threads: usize,
    /// Minimum replicas per stage, so even a single core gets some overlap.
    pub floor: usize,
    /// Maximum replicas per stage on highly parallel machines.
    pub ceiling: usize,
    /// Replicas per core = numerator / denominator (stages mostly wait on queues).
    pub per_core_numerator: usize,
    pub per_core_denominator: usize,
}

impl Default for ReplicaLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from rayon
            floor: Self::FLOOR_REPLICAS,
            ceiling: Self::MAX_REPLICAS,
            per_core_numerator: Self::PER_CORE_NUMERATOR,
            per_core_denominator: Self::PER_CORE_DENOMINATOR,
        }
    }
}

impl ReplicaLimits {
    pub const FLOOR_REPLICAS: usize = 2;
    pub const MAX_REPLICAS: usize = 27;
    pub const PER_CORE_NUMERATOR: usize = 12;
    pub const PER_CORE_DENOMINATOR: usize = 4;

    /// Build limits with `all_threads` set from `rayon::current_num_threads()`.
    pub fn current() -> Self {
        Self {
            all_threads: rayon::current_num_threads(),
            ..Self::default()
        }
    }
}

// ---- Queues ----

pub struct QueueConsts;

impl QueueConsts {
    /// Default capacity of each inter-stage queue.
    pub const DEFAULT_CAPACITY: usize = 100;
}

// ---- Transforms ----

pub struct TransformConsts;

impl TransformConsts {
    /// Default integer upscale factor.
    pub const DEFAULT_SCALE_FACTOR: u32 = 3;
    /// Pixel-tag byte step: byte 0 of the tag is `(STEP * (id + 1)) % 256`.
    pub const TAG_STEP: u64 = 4;
}

// ---- Input discovery ----

/// File extensions the image directory loads (lowercase).
pub const INPUT_EXTENSIONS: &[&str] = &["png"];
