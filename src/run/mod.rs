//! Run data model
//!
//! A run is one crawl-and-capture invocation. It lives in memory while its
//! captures are in flight and becomes a durable, immutable [`RunRecord`]
//! exactly once, when the crawl finishes.

mod artifact;

pub use artifact::{artifact_file_name, Artifact, CaptureOutcome, FailureKind};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a crawl run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generates a fresh, never reused run identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Persisted form of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub start_url: String,
    pub requested_link_count: usize,
    pub artifacts: Vec<Artifact>,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    /// Creates a record stamped with the current time
    pub fn new(
        run_id: RunId,
        start_url: String,
        requested_link_count: usize,
        artifacts: Vec<Artifact>,
    ) -> Self {
        Self {
            run_id,
            start_url,
            requested_link_count,
            artifacts,
            created_at: Utc::now(),
        }
    }

    /// Number of artifacts whose capture failed
    pub fn failed_count(&self) -> usize {
        self.artifacts.iter().filter(|a| !a.is_success()).count()
    }
}
