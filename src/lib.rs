//! Snapcrawl: crawl-and-capture orchestration
//!
//! This crate visits a start page and a bounded number of the links it
//! contains, captures a screenshot artifact for every visited page, and keeps
//! the resulting run retrievable by its run identifier through a durable store
//! fronted by a TTL cache.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod output;
pub mod run;
pub mod session;
pub mod storage;

use thiserror::Error;

/// Main error type for snapcrawl operations
#[derive(Debug, Error)]
pub enum SnapError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid crawl request: {0}")]
    Validation(#[from] ValidationError),

    #[error("Could not open a rendering session for run {run_id}: {source}")]
    SessionUnavailable {
        run_id: run::RunId,
        source: session::RenderError,
    },

    #[error("Start page {url} failed for run {run_id}: {source}")]
    StartPage {
        run_id: run::RunId,
        url: String,
        source: session::RenderError,
    },

    #[error("Failed to persist run {run_id} ({} artifacts captured): {source}", .artifacts.len())]
    Persistence {
        run_id: run::RunId,
        artifacts: Vec<run::Artifact>,
        source: storage::StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported renderer backend: {0}")]
    UnsupportedBackend(String),
}

/// Errors raised when a crawl request is rejected before any work starts
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Start URL '{url}' is not a valid absolute URL: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Start URL '{url}' must use http or https, got '{scheme}'")]
    UnsupportedScheme { url: String, scheme: String },

    #[error("Number of links to follow must be >= 0, got {0}")]
    NegativeLinkCount(i64),
}

/// Result type alias for snapcrawl operations
pub type Result<T> = std::result::Result<T, SnapError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::{MemoryResultCache, ResultCache};
pub use config::Config;
pub use crawler::{CrawlOutcome, CrawlRequest, Orchestrator, RunLookup};
pub use run::{Artifact, CaptureOutcome, FailureKind, RunId, RunRecord};
pub use session::{HttpSessionProvider, SessionProvider};
pub use storage::{ArtifactStore, SqliteArtifactStore};
