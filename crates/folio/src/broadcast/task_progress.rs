//! Task progress broadcaster for real-time bulk issuance streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Phase of a bulk issuance task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    Queued,
    Started,
    ItemIssued,
    ItemFailed,
    Completed,
    Failed,
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPhase::Queued => write!(f, "Queued"),
            TaskPhase::Started => write!(f, "Started"),
            TaskPhase::ItemIssued => write!(f, "Certificate issued"),
            TaskPhase::ItemFailed => write!(f, "Certificate failed"),
            TaskPhase::Completed => write!(f, "Completed"),
            TaskPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Progress event for a bulk issuance task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressEvent {
    pub task_id: String,
    pub product_id: String,
    pub phase: TaskPhase,
    /// Human-readable message describing current activity.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Items attempted so far.
    pub processed: usize,
    /// Eligible items in the batch (0 until known).
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskProgressEvent {
    pub fn new(task_id: &str, product_id: &str, phase: TaskPhase, message: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            product_id: product_id.to_string(),
            phase,
            message: message.to_string(),
            timestamp: Utc::now(),
            processed: 0,
            total: 0,
            participant_name: None,
            serial: None,
            error: None,
        }
    }

    /// Whether no further events follow for this task.
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, TaskPhase::Completed | TaskPhase::Failed)
    }
}

/// Broadcasts task progress events for streaming.
#[derive(Clone)]
pub struct TaskProgressBroadcaster {
    sender: Arc<broadcast::Sender<TaskProgressEvent>>,
}

impl TaskProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: TaskProgressEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for a task and announces it as queued.
    pub fn start_task(&self, task_id: &str, product_id: &str) -> TaskProgressTracker {
        let tracker = TaskProgressTracker::new(task_id, product_id, Arc::clone(&self.sender));
        tracker.send(TaskProgressEvent::new(
            task_id,
            product_id,
            TaskPhase::Queued,
            "Task queued for issuance",
        ));
        tracker
    }

    /// Gets the inner sender for creating trackers.
    pub fn sender(&self) -> Arc<broadcast::Sender<TaskProgressEvent>> {
        Arc::clone(&self.sender)
    }
}

impl Default for TaskProgressBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Tracks progress for a single task.
pub struct TaskProgressTracker {
    task_id: String,
    product_id: String,
    sender: Arc<broadcast::Sender<TaskProgressEvent>>,
}

impl TaskProgressTracker {
    pub fn new(
        task_id: &str,
        product_id: &str,
        sender: Arc<broadcast::Sender<TaskProgressEvent>>,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            product_id: product_id.to_string(),
            sender,
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    fn event(&self, phase: TaskPhase, message: &str) -> TaskProgressEvent {
        TaskProgressEvent::new(&self.task_id, &self.product_id, phase, message)
    }

    fn send(&self, event: TaskProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn started(&self, total: usize) {
        let mut event = self.event(
            TaskPhase::Started,
            &format!("Issuing {} certificate(s)", total),
        );
        event.total = total;
        self.send(event);
    }

    pub fn item_issued(&self, name: &str, serial: &str, processed: usize, total: usize) {
        let mut event = self.event(TaskPhase::ItemIssued, &format!("Issued {} for {}", serial, name));
        event.processed = processed;
        event.total = total;
        event.participant_name = Some(name.to_string());
        event.serial = Some(serial.to_string());
        self.send(event);
    }

    pub fn item_failed(&self, name: &str, error: &str, processed: usize, total: usize) {
        let mut event = self.event(TaskPhase::ItemFailed, &format!("Could not issue for {}", name));
        event.processed = processed;
        event.total = total;
        event.participant_name = Some(name.to_string());
        event.error = Some(error.to_string());
        self.send(event);
    }

    pub fn completed(&self, issued: usize, failed: usize) {
        let mut event = self.event(
            TaskPhase::Completed,
            &format!("{} issued, {} failed", issued, failed),
        );
        event.processed = issued + failed;
        event.total = issued + failed;
        self.send(event);
    }

    pub fn failed(&self, error: &str) {
        let mut event = self.event(TaskPhase::Failed, "Task failed");
        event.error = Some(error.to_string());
        self.send(event);
    }
}
