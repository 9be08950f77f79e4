//! Result cache trait and error types

use crate::run::{Artifact, RunId};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    Poisoned,

    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Fast, TTL-bounded `run_id -> artifacts` mapping used to accelerate reads
///
/// The cache is never the source of truth: callers prime it only after the
/// durable write succeeded and fall back to the store on any miss.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Sets the artifact list of a run, restarting its TTL
    async fn push(&self, run_id: &RunId, artifacts: &[Artifact]) -> CacheResult<()>;

    /// Returns the cached artifacts of a run, empty on a miss or after expiry
    async fn range(&self, run_id: &RunId) -> CacheResult<Vec<Artifact>>;
}
