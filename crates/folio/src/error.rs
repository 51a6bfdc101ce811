use std::path::PathBuf;
use thiserror::Error;

use crate::render::RenderError;

#[derive(Error, Debug)]
pub enum FolioError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Random source unavailable: {0}")]
    Random(#[from] getrandom::Error),
}

/// Coarse error classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

impl FolioError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        FolioError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FolioError::NotFound { .. } => ErrorCategory::NotFound,
            FolioError::Conflict(_) => ErrorCategory::Conflict,
            FolioError::Validation(_) | FolioError::Config(_) => ErrorCategory::Validation,
            FolioError::Render(_)
            | FolioError::Storage(_)
            | FolioError::Worker(_)
            | FolioError::Database(_)
            | FolioError::Random(_) => ErrorCategory::Internal,
        }
    }

    /// HTTP status a web front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Validation => 400,
            ErrorCategory::Internal => 500,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.category() == ErrorCategory::Conflict
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,

    #[error("Failed to encode task payload: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FolioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FolioError::not_found("Product", "c1").status_code(), 404);
        assert_eq!(FolioError::Conflict("dup".into()).status_code(), 409);
        assert_eq!(FolioError::Validation("bad".into()).status_code(), 400);
        assert_eq!(
            FolioError::Render(RenderError::Failed("boom".into())).status_code(),
            500
        );
        assert_eq!(
            FolioError::Database(crate::db::DatabaseError::LockPoisoned).status_code(),
            500
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = FolioError::not_found("Enrollment", "e-42");
        assert_eq!(err.to_string(), "Enrollment 'e-42' not found");
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_is_conflict() {
        assert!(FolioError::Conflict("already issued".into()).is_conflict());
        assert!(!FolioError::Validation("x".into()).is_conflict());
    }
}
