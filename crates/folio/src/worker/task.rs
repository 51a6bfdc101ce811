use crate::issuance::{BulkIssueRequest, BulkIssueResult};
use crate::model::TaskStatus;

/// A bulk issuance request waiting for a worker.
#[derive(Debug, Clone)]
pub struct BulkTask {
    pub id: String,
    pub request: BulkIssueRequest,
}

impl BulkTask {
    pub fn new(request: BulkIssueRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request,
        }
    }
}

/// Final state of a task as handed back by the queue.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task_id: String,
    pub product_id: String,
    pub status: TaskStatus,
    pub result: Option<BulkIssueResult>,
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn completed(task: &BulkTask, result: BulkIssueResult) -> Self {
        Self {
            task_id: task.id.clone(),
            product_id: task.request.product_id.clone(),
            status: TaskStatus::Completed,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(task: &BulkTask, error: String) -> Self {
        Self {
            task_id: task.id.clone(),
            product_id: task.request.product_id.clone(),
            status: TaskStatus::Failed,
            result: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}
