//! Issuance task repository: persisted state of queued bulk issuances.

use rusqlite::{params, Row};

use super::{query_optional, Database, DatabaseError};
use crate::model::TaskStatus;

/// A raw task row. `request` and `result` hold JSON documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub product_id: String,
    pub request: String,
    pub status: TaskStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            product_id: row.get("product_id")?,
            request: row.get("request")?,
            status: row.get("status")?,
            result: row.get("result")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

pub fn insert(db: &Database, task: &TaskRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO issuance_tasks (id, product_id, request, status, result, error,
             created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                task.id,
                task.product_id,
                task.request,
                task.status,
                task.result,
                task.error,
                task.created_at,
                task.updated_at,
                task.completed_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        query_optional(
            conn,
            "SELECT * FROM issuance_tasks WHERE id = ?1",
            params![id],
            TaskRow::from_row,
        )
    })
}

/// Moves a task to `running`.
pub fn mark_running(db: &Database, id: &str, at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE issuance_tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, TaskStatus::Running, at],
        )?;
        Ok(())
    })
}

/// Stores the JSON result of a finished task.
pub fn mark_completed(db: &Database, id: &str, result: &str, at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE issuance_tasks SET status = ?2, result = ?3, error = NULL,
             updated_at = ?4, completed_at = ?4
             WHERE id = ?1",
            params![id, TaskStatus::Completed, result, at],
        )?;
        Ok(())
    })
}

/// Stores the error of a task that could not run at all.
pub fn mark_failed(db: &Database, id: &str, error: &str, at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE issuance_tasks SET status = ?2, error = ?3, updated_at = ?4, completed_at = ?4
             WHERE id = ?1",
            params![id, TaskStatus::Failed, error, at],
        )?;
        Ok(())
    })
}

/// Tasks in the given status, oldest first.
pub fn list_by_status(db: &Database, status: TaskStatus) -> Result<Vec<TaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM issuance_tasks WHERE status = ?1 ORDER BY created_at, id",
        )?;
        let rows = stmt
            .query_map(params![status], TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
