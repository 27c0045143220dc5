//! Worker lifecycle: item pipeline, terminal commits, the poll loop, and the
//! pool that runs several loops side by side.

pub mod commit;
pub mod pipeline;
pub mod pool;
pub mod runner;

pub use commit::RowUpdater;
pub use pipeline::ItemPipeline;
pub use pool::{PoolSummary, ShutdownHandle, WorkerPool};
pub use runner::{BatchReport, ItemOutcome, LoopMode, WorkerConfig, WorkerLoop, WorkerSummary};
