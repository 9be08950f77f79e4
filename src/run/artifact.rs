//! Artifact references produced by a crawl run
//!
//! Every attempted target yields exactly one artifact, whether the capture
//! succeeded or not, so artifact `i` always lines up with target `i`.

use serde::Serialize;
use std::fmt;

use crate::run::RunId;

/// Why a single capture failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// No page context could be opened on the session
    Session,

    /// The page could not be loaded (DNS, connection, HTTP error, ...)
    Navigation,

    /// The page loaded but the artifact could not be written
    Screenshot,

    /// The per-page deadline elapsed
    Timeout,

    /// The worker task panicked or was cancelled
    Aborted,
}

impl FailureKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Navigation => "navigation",
            Self::Screenshot => "screenshot",
            Self::Timeout => "timeout",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "session" => Some(Self::Session),
            "navigation" => Some(Self::Navigation),
            "screenshot" => Some(Self::Screenshot),
            "timeout" => Some(Self::Timeout),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Outcome of one capture attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CaptureOutcome {
    Captured,
    Failed { kind: FailureKind, message: String },
}

impl CaptureOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Captured)
    }
}

/// A named handle to one captured (or attempted) page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// Position in the target list; 0 is always the start page
    pub index: usize,

    /// Storage key of the artifact, e.g. `{run_id}_screenshot_3.png`
    pub file_name: String,

    /// URL the artifact was captured from
    pub source_url: String,

    #[serde(flatten)]
    pub outcome: CaptureOutcome,
}

impl Artifact {
    pub fn captured(index: usize, file_name: String, source_url: String) -> Self {
        Self {
            index,
            file_name,
            source_url,
            outcome: CaptureOutcome::Captured,
        }
    }

    pub fn failed(
        index: usize,
        file_name: String,
        source_url: String,
        kind: FailureKind,
        message: String,
    ) -> Self {
        Self {
            index,
            file_name,
            source_url,
            outcome: CaptureOutcome::Failed { kind, message },
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Builds the artifact name for target `index` of a run
///
/// Index 0 is reserved for the start page; links follow in extraction order.
pub fn artifact_file_name(run_id: &RunId, index: usize, extension: &str) -> String {
    format!("{}_screenshot_{}.{}", run_id, index, extension)
}
