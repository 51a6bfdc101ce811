//! Broadcasting of bulk issuance progress.
//!
//! Events go out on a `tokio::sync::broadcast` channel so any number of
//! subscribers (CLI, a web socket bridge) can follow queued tasks.

pub mod task_progress;

pub use task_progress::{TaskPhase, TaskProgressBroadcaster, TaskProgressEvent, TaskProgressTracker};
