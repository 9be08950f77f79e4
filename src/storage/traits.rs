//! Storage traits and error types
//!
//! This module defines the trait interface for durable run storage and
//! associated error types.

use crate::run::{RunId, RunRecord};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run already persisted: {0}")]
    DuplicateRun(RunId),

    #[error("Corrupt record for run {run_id}: {message}")]
    Corrupt { run_id: RunId, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable, append-only storage of finished runs
///
/// Implementations must be safe to share between concurrent crawls.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Persists a finished run
    ///
    /// A run is written at most once; a second `put` for the same run id
    /// fails with [`StorageError::DuplicateRun`] and leaves the first record
    /// untouched.
    async fn put(&self, record: &RunRecord) -> StorageResult<()>;

    /// Gets a run by ID, `None` if it was never persisted
    async fn get(&self, run_id: &RunId) -> StorageResult<Option<RunRecord>>;
}
