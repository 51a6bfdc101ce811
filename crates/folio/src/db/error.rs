//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// A stored JSON column could not be encoded or decoded.
    #[error("Invalid JSON in column '{column}': {source}")]
    Json {
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl DatabaseError {
    /// Returns the violated columns (e.g. `"certificates.serial"`) when this
    /// error is a UNIQUE constraint failure.
    pub fn unique_violation(&self) -> Option<&str> {
        match self {
            DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(err, Some(msg)))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                msg.strip_prefix("UNIQUE constraint failed: ")
            }
            _ => None,
        }
    }

    /// Whether this error is a UNIQUE constraint failure touching `column`
    /// (qualified as `table.column`).
    pub fn violates(&self, column: &str) -> bool {
        self.unique_violation()
            .map(|cols| cols.split(", ").any(|c| c == column))
            .unwrap_or(false)
    }
}
