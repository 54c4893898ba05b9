use log::{debug, info, warn};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::error::{PipelineError, QueueError};
use crate::pipeline::cancel::CancelOnPanic;
use crate::pipeline::context::{PipelineContext, PipelineParts};
use crate::pipeline::error_handler::{WorkerExit, report_unsaved, resolve_run_outcome};
use crate::pipeline::fanout::{Fanout, StageSummary};
use crate::pipeline::load::run_load_worker;
use crate::pipeline::message::Message;
use crate::pipeline::queue::{BoundedQueue, QueueFactory};
use crate::pipeline::save::run_save_worker;
use crate::pipeline::transform::run_transform_worker;
use crate::pipeline::tuning::PipelineTuning;
use crate::{Mode, PipelineReport};

type StageQueues = Arc<[BoundedQueue<Message>]>;
type WorkerResult = Result<StageSummary, QueueError>;

/// Every queue of the topology. `loaded[i]` feeds scale replica `i`, `scaled[i]` pixel replica
/// `i`, `tagged[i]` save replica `i`.
pub struct TopologyQueues {
    pub loaded: StageQueues,
    pub scaled: StageQueues,
    pub tagged: StageQueues,
}

impl TopologyQueues {
    /// Allocate all queues before any thread exists. On failure the queues created so far are
    /// dropped on return.
    pub fn allocate(
        tuning: &PipelineTuning,
        factory: &dyn QueueFactory,
        ctx: &PipelineContext,
    ) -> Result<Self, PipelineError> {
        let r = tuning.replicas;
        if r.scale == 0 || r.pixel == 0 || r.save == 0 {
            return Err(PipelineError::Setup(format!(
                "every stage needs at least one replica, got {r:?}"
            )));
        }
        let make = |n: usize, link: &str| -> Result<StageQueues, PipelineError> {
            (0..n)
                .map(|i| {
                    factory
                        .create(tuning.capacity, &ctx.cancel)
                        .map_err(|e| PipelineError::Setup(format!("{link} queue {i}: {e}")))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Arc::from)
        };
        Ok(Self {
            loaded: make(r.scale, "load->scale")?,
            scaled: make(r.pixel, "scale->pixel")?,
            tagged: make(r.save, "pixel->save")?,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundedQueue<Message>> {
        self.loaded
            .iter()
            .chain(self.scaled.iter())
            .chain(self.tagged.iter())
    }
}

/// Per-worker summaries of a finished threaded run, in join order.
#[derive(Clone, Debug, Default)]
pub struct TopologySummary {
    pub load: StageSummary,
    pub scale: Vec<StageSummary>,
    pub pixel: Vec<StageSummary>,
    pub save: Vec<StageSummary>,
}

impl TopologySummary {
    /// End-of-stream markers received across all save replicas.
    pub fn sink_sentinels(&self) -> usize {
        self.save.iter().map(|s| s.sentinels_in).sum()
    }
}

/// Result of [`run_threaded`].
#[derive(Clone, Debug)]
pub struct ThreadedRun {
    pub report: PipelineReport,
    pub stages: TopologySummary,
}

struct Worker {
    name: String,
    handle: JoinHandle<WorkerResult>,
}

/// Started threads grouped by stage, so they can be joined in dependency order.
#[derive(Default)]
struct StageWorkers {
    load: Vec<Worker>,
    scale: Vec<Worker>,
    pixel: Vec<Worker>,
    save: Vec<Worker>,
}

fn spawn_worker<F>(name: String, ctx: &PipelineContext, body: F) -> Result<Worker, PipelineError>
where
    F: FnOnce() -> WorkerResult + Send + 'static,
{
    let cancel = ctx.cancel.clone();
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _guard = CancelOnPanic(cancel.clone());
            let result = body();
            // A worker that quits without closing its outputs would strand its consumers.
            if result.is_err() {
                cancel.cancel();
            }
            result
        })
        .map_err(|e| PipelineError::Setup(format!("spawn {name}: {e}")))?;
    Ok(Worker { name, handle })
}

fn join_stage(workers: Vec<Worker>, summaries: &mut Vec<StageSummary>, exits: &mut Vec<WorkerExit>) {
    for Worker { name, handle } in workers {
        match handle.join() {
            Ok(Ok(summary)) => {
                summaries.push(summary);
                exits.push(WorkerExit::Finished);
            }
            Ok(Err(err)) => {
                debug!("{} stopped: {}", name, err);
                exits.push(WorkerExit::Failed { name, err });
            }
            Err(_) => exits.push(WorkerExit::Panicked { name }),
        }
    }
}

impl StageWorkers {
    /// Join load, then scale, then pixel, then save replicas.
    fn join_all(self) -> (TopologySummary, Vec<WorkerExit>) {
        let mut summary = TopologySummary::default();
        let mut exits = Vec::new();
        let mut load = Vec::new();
        join_stage(self.load, &mut load, &mut exits);
        summary.load = load.into_iter().next().unwrap_or_default();
        join_stage(self.scale, &mut summary.scale, &mut exits);
        join_stage(self.pixel, &mut summary.pixel, &mut exits);
        join_stage(self.save, &mut summary.save, &mut exits);
        (summary, exits)
    }
}

/// Start every replica. Consumers start first so producers rarely park on a full queue early;
/// any order terminates because every thread is started before anything is joined.
fn start_workers(
    parts: PipelineParts,
    queues: &TopologyQueues,
    tuning: &PipelineTuning,
    ctx: &PipelineContext,
) -> Result<StageWorkers, (StageWorkers, PipelineError)> {
    let r = tuning.replicas;
    let PipelineParts {
        mut source,
        sink,
        scale,
        tag,
        progress,
    } = parts;
    let mut workers = StageWorkers::default();

    macro_rules! try_spawn {
        ($stage:expr, $name:expr, $body:expr) => {
            match spawn_worker($name, ctx, $body) {
                Ok(w) => $stage.push(w),
                Err(e) => return Err((workers, e)),
            }
        };
    }

    for i in 0..r.save {
        let input = queues.tagged[i].clone();
        let sink = Arc::clone(&sink);
        let progress = Arc::clone(&progress);
        let ctx_w = ctx.clone();
        try_spawn!(workers.save, format!("save-{i}"), move || {
            run_save_worker(&input, r.pixel, sink.as_ref(), &progress, &ctx_w)
        });
    }
    for i in 0..r.pixel {
        let input = queues.scaled[i].clone();
        let out = Fanout::new(Arc::clone(&queues.tagged), i);
        let tag = Arc::clone(&tag);
        let ctx_w = ctx.clone();
        try_spawn!(workers.pixel, format!("pixel-{i}"), move || {
            run_transform_worker(&input, r.scale, tag.as_ref(), out, &ctx_w)
        });
    }
    for i in 0..r.scale {
        let input = queues.loaded[i].clone();
        let out = Fanout::new(Arc::clone(&queues.scaled), i);
        let scale = Arc::clone(&scale);
        let ctx_w = ctx.clone();
        try_spawn!(workers.scale, format!("scale-{i}"), move || {
            run_transform_worker(&input, 1, scale.as_ref(), out, &ctx_w)
        });
    }
    let out = Fanout::new(Arc::clone(&queues.loaded), 0);
    let ctx_w = ctx.clone();
    try_spawn!(workers.load, "load".to_string(), move || {
        run_load_worker(source.as_mut(), out, &ctx_w)
    });

    Ok(workers)
}

/// Run the load → scale → pixel → save thread topology over `parts`.
///
/// Queues come from `factory` and are all allocated up front; if any allocation fails no thread
/// is started. If a thread fails to start, the run is cancelled, the started threads are joined,
/// and a setup error is returned.
pub fn run_threaded(
    parts: PipelineParts,
    tuning: &PipelineTuning,
    ctx: &PipelineContext,
    factory: &dyn QueueFactory,
) -> Result<ThreadedRun, PipelineError> {
    let start = Instant::now();
    let r = tuning.replicas;
    info!(
        "Topology: 1 loader, {} scale, {} pixel, {} save replicas; queue capacity {}",
        r.scale, r.pixel, r.save, tuning.capacity
    );

    let queues = TopologyQueues::allocate(tuning, factory, ctx)?;
    debug!("Allocated {} queues", queues.iter().count());

    let workers = match start_workers(parts, &queues, tuning, ctx) {
        Ok(w) => w,
        Err((started, err)) => {
            warn!("Setup failed, stopping started threads: {}", err);
            ctx.cancel.cancel();
            let _ = started.join_all();
            return Err(err);
        }
    };
    debug!("Started {} threads", r.total_threads());

    let (stages, exits) = workers.join_all();
    resolve_run_outcome(ctx, &exits)?;

    for (i, q) in queues.iter().enumerate() {
        if !q.is_empty() || q.handle_count() > 1 {
            warn!(
                "Queue {} not drained at shutdown: {} items, {} handles",
                i,
                q.len(),
                q.handle_count()
            );
        }
    }
    drop(queues);

    let report = ctx.stats.snapshot(Mode::Threads, start.elapsed());
    report_unsaved(&report);
    debug!(
        "Threaded run done: {} saved, sink saw {} end-of-stream markers",
        report.saved,
        stages.sink_sentinels()
    );
    Ok(ThreadedRun { report, stages })
}
