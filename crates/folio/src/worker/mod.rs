//! Asynchronous bulk issuance: a worker thread pool fed by a bounded
//! channel, with every task persisted in `issuance_tasks`.

pub mod pool;
pub mod task;

pub use pool::IssuanceQueue;
pub use task::{BulkTask, TaskOutcome};
