//! Coordination core: stride ID allocation for producers, cursor-based
//! interval claiming for consumer groups, batch fetching, throughput
//! reporting and the worker supervisor tying them together.

mod allocator;
mod cursor;
mod error;
mod fetcher;
mod handler;
pub mod records;
mod reporter;
mod supervisor;
mod worker;

#[cfg(test)]
mod testing;

pub use allocator::IdAllocator;
pub use cursor::{CursorCoordinator, Interval};
pub use error::EngineError;
pub use fetcher::{BatchFetcher, EmptyBatchPolicy};
pub use handler::{CountingHandler, DiscardHandler, RecordHandler};
pub use reporter::{Report, Sample, ThroughputReporter};
pub use supervisor::{RunSummary, Supervisor};
pub use worker::{
    ConsumerConfig, ConsumerWorker, ProducerWorker, RecordTemplate, Role, WorkerExit, WorkerReport,
};
