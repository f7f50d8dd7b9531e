//! Error types for the decision ledger and preferences store.

use std::path::PathBuf;

use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during ledger database operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Failed to open or create the database file.
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    /// Failed to run a database migration.
    #[error("Database migration failed: {0}")]
    Migration(#[from] rusqlite::Error),

    /// A read or write did not complete. The decision is not persisted.
    #[error("Ledger storage failure: {0}")]
    StorageFailure(String),

    /// A uniqueness constraint was violated despite the upsert protocol.
    #[error("Ledger integrity violation: {0}")]
    ConstraintViolation(String),

    /// Failed to spawn a blocking task.
    #[error("Failed to spawn blocking task: {0}")]
    Spawn(#[from] tokio::task::JoinError),

    /// The database schema version is newer than supported.
    #[error("Database schema version {found} is newer than supported version {expected}")]
    UnsupportedSchemaVersion { found: i32, expected: i32 },
}

impl LedgerError {
    /// Classify a rusqlite error raised by a query or write.
    ///
    /// UNIQUE/NOT NULL failures become `ConstraintViolation`; everything else
    /// (busy, locked, I/O, full disk) is a `StorageFailure`.
    pub fn query(source: rusqlite::Error) -> Self {
        match &source {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(source.to_string())
            }
            _ => Self::StorageFailure(source.to_string()),
        }
    }

    /// Whether the caller may retry the operation.
    ///
    /// Only storage failures are transient. Integrity and schema errors are
    /// fatal and must not be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageFailure(_))
    }
}
