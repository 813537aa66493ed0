//! Store error types.

use std::path::PathBuf;

/// Errors that can occur during persistence operations.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Failed to open or create database.
    #[error("Failed to open database at {path}: {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Failed to execute SQL.
    #[error("Database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Failed to serialize or deserialize a stored document.
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A uniqueness constraint was violated.
    #[error("Record already exists: {0}")]
    Conflict(String),

    /// A stored value could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Blocking task was cancelled.
    #[error("Blocking task cancelled")]
    TaskCancelled,

    /// Failed to create parent directory.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Map SQLite constraint violations to [`StoreError::Conflict`].
    pub(crate) fn from_insert(err: rusqlite::Error, what: &str) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(ref e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(what.to_string())
            }
            other => Self::Query(other),
        }
    }
}
