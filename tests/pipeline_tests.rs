//! Pipeline tests: thread topology, failure policies, setup failures, serial and task modes.

use imgpipe::engine::filters::{Transform, add_pixel, tag_pixel};
use imgpipe::engine::progress::ProgressFn;
use imgpipe::error::{FilterError, PipelineError, QueueError};
use imgpipe::pipeline::{
    BoundedQueue, CancelToken, ChannelQueueFactory, Fanout, Message, PipelineContext,
    PipelineParts, PipelineTuning, QueueFactory, QueueTracker, run_threaded,
};
use imgpipe::{
    FailurePolicy, Image, ImageId, ImageSink, Mode, Pixel, PipelineOpts, StageReplicas,
    run_pipeline,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const BASE: Pixel = Pixel([10, 20, 30, 40]);

#[derive(Clone, Debug, PartialEq, Eq)]
struct Saved {
    id: ImageId,
    width: u32,
    height: u32,
    corner: Pixel,
}

#[derive(Clone, Default)]
struct MemorySink {
    saved: Arc<Mutex<Vec<Saved>>>,
}

impl MemorySink {
    fn ids(&self) -> BTreeSet<u64> {
        self.saved.lock().unwrap().iter().map(|s| s.id.0).collect()
    }

    fn count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }
}

impl ImageSink for MemorySink {
    fn save(&self, image: &Image) -> imgpipe::Result<()> {
        self.saved.lock().unwrap().push(Saved {
            id: image.id(),
            width: image.width(),
            height: image.height(),
            corner: image.pixel(0, 0).unwrap(),
        });
        Ok(())
    }
}

/// Tags like the pixel stage but fails on one id.
struct FailOn(u64);

impl Transform for FailOn {
    fn name(&self) -> &'static str {
        "pixel"
    }

    fn apply(&self, image: &Image) -> Result<Image, FilterError> {
        if image.id() == ImageId(self.0) {
            return Err(FilterError::Other(format!("refusing image {}", self.0)));
        }
        add_pixel(image, tag_pixel(image.id()))
    }
}

struct PanicOn(u64);

impl Transform for PanicOn {
    fn name(&self) -> &'static str {
        "pixel"
    }

    fn apply(&self, image: &Image) -> Result<Image, FilterError> {
        if image.id() == ImageId(self.0) {
            panic!("transform blew up on {}", self.0);
        }
        add_pixel(image, tag_pixel(image.id()))
    }
}

fn images(n: usize) -> impl Iterator<Item = Image> + Send + 'static {
    (0..n).map(|_| Image::filled(2, 2, BASE).unwrap())
}

fn tuning(replicas: StageReplicas, capacity: usize) -> PipelineTuning {
    PipelineTuning { replicas, capacity }
}

fn counting_progress() -> (Arc<AtomicUsize>, ProgressFn) {
    let marks = Arc::new(AtomicUsize::new(0));
    let m = Arc::clone(&marks);
    let progress: ProgressFn = Arc::new(move |n: usize| {
        m.fetch_add(n, Ordering::SeqCst);
    });
    (marks, progress)
}

/// Records every queue it hands out; fails the `fail_at`-th allocation (1-based).
struct FailingFactory {
    calls: AtomicUsize,
    fail_at: usize,
    trackers: Mutex<Vec<QueueTracker>>,
}

impl FailingFactory {
    fn new(fail_at: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_at,
            trackers: Mutex::new(Vec::new()),
        }
    }
}

impl QueueFactory for FailingFactory {
    fn create(
        &self,
        capacity: usize,
        cancel: &CancelToken,
    ) -> Result<BoundedQueue<Message>, QueueError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_at {
            return Err(QueueError::AllocationFailed);
        }
        let q = BoundedQueue::with_cancel(capacity, cancel)?;
        self.trackers.lock().unwrap().push(q.tracker());
        Ok(q)
    }
}

// --- thread topology ---

#[test]
fn test_single_replica_topology_saves_everything() {
    let sink = MemorySink::default();
    let (marks, progress) = counting_progress();
    let parts = PipelineParts::new(images(5), sink.clone(), 3).with_progress(progress);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());

    let run = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(1), 2),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap();

    assert_eq!(run.report.mode, Mode::Threads);
    assert_eq!(run.report.loaded, 5);
    assert_eq!(run.report.saved, 5);
    assert!(run.report.is_balanced());
    assert_eq!(run.stages.sink_sentinels(), 1);
    assert_eq!(marks.load(Ordering::SeqCst), 5);
    assert_eq!(sink.ids(), (0..5).collect());
}

#[test]
fn test_saved_images_are_scaled_and_tagged() {
    let sink = MemorySink::default();
    let parts = PipelineParts::new(images(3), sink.clone(), 3);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());
    run_threaded(
        parts,
        &tuning(StageReplicas::uniform(1), 4),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap();

    for saved in sink.saved.lock().unwrap().iter() {
        assert_eq!((saved.width, saved.height), (6, 6));
        let expected = BASE.0[0] + (4 * (saved.id.0 + 1)) as u8;
        assert_eq!(saved.corner, Pixel([expected, 20, 30, 40]));
    }
}

#[test]
fn test_multi_replica_topology_no_loss_no_duplicates() {
    let sink = MemorySink::default();
    let parts = PipelineParts::new(images(60), sink.clone(), 2);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());
    let replicas = StageReplicas {
        scale: 3,
        pixel: 2,
        save: 4,
    };

    let run = run_threaded(parts, &tuning(replicas, 1), &ctx, &ChannelQueueFactory).unwrap();

    assert_eq!(run.report.saved, 60);
    assert_eq!(sink.count(), 60);
    assert_eq!(sink.ids(), (0..60).collect());
    assert_eq!(run.stages.load.sentinels_out, 3);
    assert!(run.stages.scale.iter().all(|s| s.sentinels_in == 1));
    assert!(run.stages.pixel.iter().all(|s| s.sentinels_in == 3));
    assert!(run.stages.save.iter().all(|s| s.sentinels_in == 2));
    assert_eq!(run.stages.sink_sentinels(), 4 * 2);
}

#[test]
fn test_empty_source_terminates() {
    let sink = MemorySink::default();
    let parts = PipelineParts::new(images(0), sink.clone(), 3);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());
    let run = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(2), 1),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap();
    assert_eq!(run.report.loaded, 0);
    assert_eq!(run.report.saved, 0);
    assert_eq!(sink.count(), 0);
}

// --- failure policies ---

#[test]
fn test_skip_policy_drops_failed_image() {
    let sink = MemorySink::default();
    let (marks, progress) = counting_progress();
    let parts = PipelineParts::new(images(5), sink.clone(), 3)
        .with_tag(FailOn(2))
        .with_progress(progress);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());

    let run = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(1), 2),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap();

    assert_eq!(sink.ids(), BTreeSet::from([0, 1, 3, 4]));
    assert_eq!(marks.load(Ordering::SeqCst), 4);
    assert_eq!(run.report.dropped, 1);
    assert!(run.report.is_balanced());
}

#[test]
fn test_forward_policy_counts_marker_at_sink() {
    let sink = MemorySink::default();
    let parts = PipelineParts::new(images(5), sink.clone(), 3).with_tag(FailOn(2));
    let ctx = PipelineContext::new(FailurePolicy::Forward, &CancelToken::new());
    let replicas = StageReplicas {
        scale: 2,
        pixel: 2,
        save: 2,
    };

    let run = run_threaded(parts, &tuning(replicas, 2), &ctx, &ChannelQueueFactory).unwrap();

    assert_eq!(run.report.saved, 4);
    assert_eq!(run.report.failed, 1);
    assert_eq!(run.report.dropped, 0);
    assert!(run.report.is_balanced());
    assert!(!sink.ids().contains(&2));
}

#[test]
fn test_abort_policy_stops_run_with_first_error() {
    let sink = MemorySink::default();
    let parts = PipelineParts::new(images(50), sink.clone(), 3).with_tag(FailOn(2));
    let ctx = PipelineContext::new(FailurePolicy::Abort, &CancelToken::new());

    let err = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(2), 1),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap_err();

    match err {
        PipelineError::Aborted { stage, id, .. } => {
            assert_eq!(stage, "pixel");
            assert_eq!(id, ImageId(2));
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert!(ctx.cancel.is_cancelled());
    assert!(!sink.ids().contains(&2));
}

#[test]
fn test_sink_errors_are_counted_not_fatal() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts);
    let sink = move |image: &Image| -> imgpipe::Result<()> {
        a.fetch_add(1, Ordering::SeqCst);
        if image.id() == ImageId(1) {
            anyhow::bail!("disk full");
        }
        Ok(())
    };
    let parts = PipelineParts::new(images(4), sink, 3);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());

    let run = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(1), 2),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap();

    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert_eq!(run.report.saved, 3);
    assert_eq!(run.report.save_errors, 1);
    assert!(run.report.is_balanced());
}

#[test]
fn test_worker_panic_is_reported() {
    let parts = PipelineParts::new(images(10), MemorySink::default(), 3).with_tag(PanicOn(1));
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());

    let err = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(1), 1),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::WorkerPanicked(ref name) if name == "pixel-0"));
}

// --- cancellation and setup ---

#[test]
fn test_cancelled_before_start_returns_cancelled() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let sink = MemorySink::default();
    let parts = PipelineParts::new(images(5), sink.clone(), 3);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &cancel);

    let err = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(2), 2),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert_eq!(sink.count(), 0);
}

#[test]
fn test_queue_allocation_failure_starts_nothing() {
    let touched = Arc::new(AtomicBool::new(false));
    let t = Arc::clone(&touched);
    let source = std::iter::from_fn(move || {
        t.store(true, Ordering::SeqCst);
        None::<Image>
    });
    let parts = PipelineParts::new(source, MemorySink::default(), 3);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());
    let factory = FailingFactory::new(3);

    let err = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(1), 2),
        &ctx,
        &factory,
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::Setup(_)));
    assert!(!touched.load(Ordering::SeqCst));
    let trackers = factory.trackers.lock().unwrap();
    assert_eq!(trackers.len(), 2);
    assert!(trackers.iter().all(QueueTracker::is_released));
}

#[test]
fn test_zero_capacity_is_setup_error() {
    let parts = PipelineParts::new(images(1), MemorySink::default(), 3);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());
    let err = run_threaded(
        parts,
        &tuning(StageReplicas::uniform(1), 0),
        &ctx,
        &ChannelQueueFactory,
    )
    .unwrap_err();
    assert!(matches!(err, PipelineError::Setup(_)));
}

#[test]
fn test_all_queues_released_after_run() {
    let factory = FailingFactory::new(usize::MAX);
    let parts = PipelineParts::new(images(8), MemorySink::default(), 3);
    let ctx = PipelineContext::new(FailurePolicy::Skip, &CancelToken::new());
    run_threaded(
        parts,
        &tuning(StageReplicas::uniform(2), 2),
        &ctx,
        &factory,
    )
    .unwrap();
    let trackers = factory.trackers.lock().unwrap();
    assert_eq!(trackers.len(), 6);
    assert!(trackers.iter().all(QueueTracker::is_released));
}

// --- fanout ---

#[test]
fn test_fanout_round_robin_and_single_close() {
    let queues: Arc<[BoundedQueue<Message>]> = (0..3)
        .map(|_| BoundedQueue::new(4).unwrap())
        .collect::<Vec<_>>()
        .into();
    let mut out = Fanout::new(Arc::clone(&queues), 1);
    assert_eq!(out.width(), 3);
    for i in 0..3 {
        let image = Image::filled(1, 1, BASE).unwrap().with_id(ImageId(i));
        out.send(Message::Item(image)).unwrap();
    }
    assert_eq!(out.close().unwrap(), 3);

    // Cursor started at 1: ids 0, 1, 2 land on queues 1, 2, 0.
    assert_eq!(queues[1].pop().unwrap().id(), Some(ImageId(0)));
    assert_eq!(queues[2].pop().unwrap().id(), Some(ImageId(1)));
    assert_eq!(queues[0].pop().unwrap().id(), Some(ImageId(2)));
    for q in queues.iter() {
        assert!(q.pop().unwrap().is_end_of_stream());
        assert!(q.is_empty());
    }
}

// --- serial and task modes ---

fn run_mode(mode: Mode, policy: FailurePolicy, n: usize) -> (MemorySink, imgpipe::PipelineReport) {
    let sink = MemorySink::default();
    let parts = PipelineParts::new(images(n), sink.clone(), 3).with_tag(FailOn(2));
    let opts = PipelineOpts {
        mode,
        num_threads: Some(2),
        on_transform_error: policy,
        ..Default::default()
    };
    let report = run_pipeline(parts, &opts, &CancelToken::new()).unwrap();
    (sink, report)
}

#[test]
fn test_serial_mode_matches_threads() {
    let (serial_sink, serial) = run_mode(Mode::Serial, FailurePolicy::Skip, 6);
    let (threads_sink, threads) = run_mode(Mode::Threads, FailurePolicy::Skip, 6);
    assert_eq!(serial.mode, Mode::Serial);
    assert_eq!(serial.saved, 5);
    assert_eq!(threads.saved, 5);
    assert_eq!(serial_sink.ids(), threads_sink.ids());
}

#[test]
fn test_tasks_mode_saves_all_but_failed() {
    let (sink, report) = run_mode(Mode::Tasks, FailurePolicy::Forward, 20);
    assert_eq!(report.mode, Mode::Tasks);
    assert_eq!(report.saved, 19);
    assert_eq!(report.failed, 1);
    assert!(report.is_balanced());
    let expected: BTreeSet<u64> = (0..20).filter(|i| *i != 2).collect();
    assert_eq!(sink.ids(), expected);
}

#[test]
fn test_serial_abort_returns_first_error() {
    let sink = MemorySink::default();
    let parts = PipelineParts::new(images(5), sink.clone(), 3).with_tag(FailOn(2));
    let opts = PipelineOpts {
        mode: Mode::Serial,
        on_transform_error: FailurePolicy::Abort,
        ..Default::default()
    };
    let err = run_pipeline(parts, &opts, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, PipelineError::Aborted { id: ImageId(2), .. }));
    assert_eq!(sink.ids(), BTreeSet::from([0, 1]));
}

#[test]
fn test_tasks_cancelled_before_start() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let opts = PipelineOpts {
        mode: Mode::Tasks,
        num_threads: Some(2),
        ..Default::default()
    };
    let parts = PipelineParts::new(images(5), MemorySink::default(), 3);
    let err = run_pipeline(parts, &opts, &cancel).unwrap_err();
    assert!(matches!(err, PipelineError::Cancelled));
}
