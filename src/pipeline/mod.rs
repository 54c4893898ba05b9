//! Pipeline components: queues, stage workers, thread topology, serial and task runners.

pub mod cancel;
pub mod chain;
pub mod context;
pub mod error_handler;
pub mod fanout;
pub mod load;
pub mod message;
pub mod orchestrator;
pub mod queue;
pub mod save;
pub mod serial;
pub mod tasks;
pub mod transform;
pub mod tuning;

pub use cancel::CancelToken;
pub use context::{ImageSink, ImageSource, PipelineContext, PipelineParts, RunStats};
pub use fanout::{Fanout, StageSummary};
pub use load::run_load_worker;
pub use message::{FailedItem, Message};
pub use orchestrator::{ThreadedRun, TopologyQueues, TopologySummary, run_threaded};
pub use queue::{BoundedQueue, ChannelQueueFactory, QueueFactory, QueueTracker};
pub use save::run_save_worker;
pub use serial::run_serial;
pub use tasks::run_tasks;
pub use transform::run_transform_worker;
pub use tuning::{PipelineTuning, determine_replicas, optimal_replicas};
