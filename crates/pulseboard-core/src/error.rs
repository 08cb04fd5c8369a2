//! Centralized error types for Pulseboard.

use thiserror::Error;

/// Main error type for core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown view kind: {0}")]
    UnknownViewKind(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    Database(#[from] pulseboard_db::DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }
}
