use std::sync::Arc;

use tokio::sync::broadcast;

use crate::broadcast::task_progress::{TaskProgressEvent, TaskProgressTracker};

/// Events emitted while a bulk issuance runs.
pub enum ProgressEvent {
    Started {
        total: usize,
    },
    Issued {
        name: String,
        serial: String,
        processed: usize,
        total: usize,
    },
    Failed {
        name: String,
        error: String,
        processed: usize,
        total: usize,
    },
    Finished {
        issued: usize,
        failed: usize,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Reporter for inline calls.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges issuance events to the task broadcast channel.
pub struct BroadcastProgress {
    tracker: TaskProgressTracker,
}

impl BroadcastProgress {
    pub fn new(
        task_id: &str,
        product_id: &str,
        sender: Arc<broadcast::Sender<TaskProgressEvent>>,
    ) -> Self {
        Self {
            tracker: TaskProgressTracker::new(task_id, product_id, sender),
        }
    }

    pub fn from_tracker(tracker: TaskProgressTracker) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &TaskProgressTracker {
        &self.tracker
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => self.tracker.started(total),
            ProgressEvent::Issued {
                name,
                serial,
                processed,
                total,
            } => self.tracker.item_issued(&name, &serial, processed, total),
            ProgressEvent::Failed {
                name,
                error,
                processed,
                total,
            } => self.tracker.item_failed(&name, &error, processed, total),
            ProgressEvent::Finished { issued, failed } => self.tracker.completed(issued, failed),
        }
    }
}
