//! Thread-count policy: replicas per stage from available parallelism.

use log::debug;

use crate::StageReplicas;
use crate::utils::config::ReplicaLimits;

/// Replicas for `available` hardware threads: `available * 12 / 4`, clamped to
/// `[limits.floor, limits.ceiling]`. Stage threads spend most of their time parked on queues,
/// hence more than one replica per core.
pub fn optimal_replicas(available: usize, limits: &ReplicaLimits) -> usize {
    let raw = available.saturating_mul(limits.per_core_numerator) / limits.per_core_denominator.max(1);
    raw.clamp(limits.floor, limits.ceiling.max(limits.floor))
}

/// Replica count for a run. An explicit override wins but is still kept in `[1, ceiling]`.
pub fn determine_replicas(limits: &ReplicaLimits, thread_override: Option<usize>) -> usize {
    let n = match thread_override {
        Some(n) => n.clamp(1, limits.ceiling.max(1)),
        None => optimal_replicas(limits.all_threads, limits),
    };
    debug!(
        "Replicas per stage: {} (available threads {}, override {:?})",
        n, limits.all_threads, thread_override
    );
    n
}

/// Replica layout and queue capacity for the thread topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineTuning {
    pub replicas: StageReplicas,
    /// Capacity of every inter-stage queue.
    pub capacity: usize,
}

impl PipelineTuning {
    /// Uniform replicas from the current machine (or `thread_override`).
    pub fn detect(thread_override: Option<usize>, capacity: usize) -> Self {
        let n = determine_replicas(&ReplicaLimits::current(), thread_override);
        Self {
            replicas: StageReplicas::uniform(n),
            capacity,
        }
    }
}
