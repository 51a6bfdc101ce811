use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, warn};

use crate::broadcast::{TaskProgressBroadcaster, TaskProgressEvent};
use crate::db::task_repo::{self, TaskRow};
use crate::db::{now_timestamp, Database, DatabaseError};
use crate::error::{FolioError, Result, WorkerError};
use crate::issuance::{BroadcastProgress, BulkIssueRequest, BulkIssueResult, Issuer};
use crate::model::TaskStatus;
use crate::worker::task::{BulkTask, TaskOutcome};

/// Runs bulk issuances on worker threads.
///
/// `submit` persists a `queued` task and returns its id right away; a
/// worker marks it `running`, runs the same bulk workflow as
/// [`Issuer::issue_bulk`] and stores the JSON result (or the error). Callers
/// poll [`IssuanceQueue::status`], follow [`IssuanceQueue::subscribe`], or
/// block on [`IssuanceQueue::recv_result`].
///
/// Outcomes nobody reads are dropped once the result buffer is full; the
/// persisted task row always holds the final state.
pub struct IssuanceQueue {
    db: Database,
    task_sender: Sender<BulkTask>,
    result_receiver: Receiver<TaskOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    progress: TaskProgressBroadcaster,
}

/// Finished outcomes kept in memory for `recv_result` callers.
pub const DEFAULT_RESULT_BUFFER: usize = 64;

impl IssuanceQueue {
    pub fn new(issuer: Issuer, worker_count: usize, progress: TaskProgressBroadcaster) -> Self {
        Self::with_result_buffer(issuer, worker_count, progress, DEFAULT_RESULT_BUFFER)
    }

    pub fn with_result_buffer(
        issuer: Issuer,
        worker_count: usize,
        progress: TaskProgressBroadcaster,
        result_buffer: usize,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let (task_sender, task_receiver) = bounded::<BulkTask>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<TaskOutcome>(result_buffer.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let task_rx = task_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_issuer = issuer.clone();
            let progress_sender = progress.sender();

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    task_rx,
                    result_tx,
                    shutdown_flag,
                    worker_issuer,
                    progress_sender,
                );
            });

            workers.push(handle);
        }

        info!("Started {} issuance workers", worker_count);

        Self {
            db: issuer.database().clone(),
            task_sender,
            result_receiver,
            workers,
            shutdown,
            progress,
        }
    }

    /// Persists and enqueues a bulk issuance. Returns the task id.
    pub fn submit(&self, request: BulkIssueRequest) -> Result<String> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed.into());
        }

        let task = BulkTask::new(request);
        let now = now_timestamp();
        task_repo::insert(
            &self.db,
            &TaskRow {
                id: task.id.clone(),
                product_id: task.request.product_id.clone(),
                request: serde_json::to_string(&task.request).map_err(WorkerError::Encode)?,
                status: TaskStatus::Queued,
                result: None,
                error: None,
                created_at: now.clone(),
                updated_at: now,
                completed_at: None,
            },
        )?;

        self.progress.start_task(&task.id, &task.request.product_id);
        self.enqueue(task)
    }

    /// Re-enqueues tasks left `queued` or `running` by a previous process.
    pub fn resume_pending(&self) -> Result<usize> {
        let mut pending = task_repo::list_by_status(&self.db, TaskStatus::Queued)?;
        pending.extend(task_repo::list_by_status(&self.db, TaskStatus::Running)?);

        let mut resumed = 0;
        for row in pending {
            let request: BulkIssueRequest = match serde_json::from_str(&row.request) {
                Ok(request) => request,
                Err(e) => {
                    let err = DatabaseError::Json {
                        column: "request",
                        source: e,
                    };
                    warn!(task_id = %row.id, "Skipping unreadable task: {}", err);
                    task_repo::mark_failed(&self.db, &row.id, &err.to_string(), &now_timestamp())?;
                    continue;
                }
            };
            self.enqueue(BulkTask {
                id: row.id,
                request,
            })?;
            resumed += 1;
        }

        if resumed > 0 {
            info!("Resumed {} pending issuance task(s)", resumed);
        }
        Ok(resumed)
    }

    fn enqueue(&self, task: BulkTask) -> Result<String> {
        let id = task.id.clone();
        if self.task_sender.send(task).is_err() {
            task_repo::mark_failed(&self.db, &id, "issuance queue closed", &now_timestamp())?;
            return Err(WorkerError::ChannelClosed.into());
        }
        debug!(task_id = %id, "Task enqueued");
        Ok(id)
    }

    /// Current persisted state of a task.
    pub fn status(&self, task_id: &str) -> Result<TaskRow> {
        task_repo::find_by_id(&self.db, task_id)?
            .ok_or_else(|| FolioError::not_found("Task", task_id))
    }

    /// Decoded result of a completed task; `None` while it has not finished
    /// successfully.
    pub fn result(&self, task_id: &str) -> Result<Option<BulkIssueResult>> {
        let row = self.status(task_id)?;
        match row.result {
            Some(json) => {
                let result = serde_json::from_str(&json).map_err(|e| DatabaseError::Json {
                    column: "result",
                    source: e,
                })?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskProgressEvent> {
        self.progress.subscribe()
    }

    pub fn try_recv_result(&self) -> Option<TaskOutcome> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<TaskOutcome> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down issuance queue...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Drop sender to signal workers to exit
        drop(self.task_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All issuance workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    task_receiver: Receiver<BulkTask>,
    result_sender: Sender<TaskOutcome>,
    shutdown: Arc<AtomicBool>,
    issuer: Issuer,
    progress_sender: Arc<broadcast::Sender<TaskProgressEvent>>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match task_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(task) => {
                let outcome = execute(&issuer, &task, Arc::clone(&progress_sender));
                match result_sender.try_send(outcome) {
                    Ok(()) => {}
                    Err(TrySendError::Full(outcome)) => {
                        warn!(
                            task_id = %outcome.task_id,
                            "Result buffer full, outcome only kept in the task row"
                        );
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        error!("Worker {} result channel closed", worker_id);
                        break;
                    }
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} task channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn execute(
    issuer: &Issuer,
    task: &BulkTask,
    progress_sender: Arc<broadcast::Sender<TaskProgressEvent>>,
) -> TaskOutcome {
    let _span = info_span!("task",
        task_id = %task.id,
        product_id = %task.request.product_id,
    )
    .entered();
    let db = issuer.database();

    if let Err(e) = task_repo::mark_running(db, &task.id, &now_timestamp()) {
        warn!("Could not mark task running: {}", e);
    }

    let progress = BroadcastProgress::new(&task.id, &task.request.product_id, progress_sender);
    match issuer.issue_bulk_with_progress(&task.request, &progress) {
        Ok(result) => {
            let stored = serde_json::to_string(&result)
                .map_err(|e| DatabaseError::Json {
                    column: "result",
                    source: e,
                })
                .and_then(|json| task_repo::mark_completed(db, &task.id, &json, &now_timestamp()));
            if let Err(e) = stored {
                warn!("Could not store task result: {}", e);
            }
            TaskOutcome::completed(task, result)
        }
        Err(e) => {
            let message = e.to_string();
            warn!("Task failed: {}", message);
            progress.tracker().failed(&message);
            if let Err(db_err) = task_repo::mark_failed(db, &task.id, &message, &now_timestamp()) {
                warn!("Could not store task failure: {}", db_err);
            }
            TaskOutcome::failed(task, message)
        }
    }
}
