//! Client-facing response shapes
//!
//! A finished run is reported as `{run_id, screenshots: [...]}` whether it
//! comes straight from a crawl or from a later lookup.

use crate::crawler::{CrawlOutcome, RunView};
use crate::run::{Artifact, CaptureOutcome, RunId};
use serde::Serialize;
use std::fmt::Write;

/// Path prefix under which artifacts are served
pub const ARTIFACT_URL_PREFIX: &str = "/static/screenshots";

/// One screenshot entry in a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreenshotEntry {
    pub filename: String,
    pub url: String,
    pub source_url: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Artifact> for ScreenshotEntry {
    fn from(artifact: &Artifact) -> Self {
        let (status, error) = match &artifact.outcome {
            CaptureOutcome::Captured => ("captured", None),
            CaptureOutcome::Failed { kind, message } => ("failed", Some(format!("{kind}: {message}"))),
        };
        Self {
            filename: artifact.file_name.clone(),
            url: format!("{}/{}", ARTIFACT_URL_PREFIX, artifact.file_name),
            source_url: artifact.source_url.clone(),
            status,
            error,
        }
    }
}

/// Response body for a crawl or lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResponse {
    pub run_id: RunId,
    pub screenshots: Vec<ScreenshotEntry>,
}

impl RunResponse {
    pub fn new(run_id: RunId, artifacts: &[Artifact]) -> Self {
        Self {
            run_id,
            screenshots: artifacts.iter().map(ScreenshotEntry::from).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable rendering, one line per screenshot
    pub fn to_text(&self) -> String {
        let failed = self.screenshots.iter().filter(|s| s.error.is_some()).count();
        let mut out = String::new();

        let _ = writeln!(out, "Run: {}", self.run_id);
        let _ = writeln!(
            out,
            "Screenshots: {} ({} captured, {} failed)",
            self.screenshots.len(),
            self.screenshots.len() - failed,
            failed
        );
        for (index, entry) in self.screenshots.iter().enumerate() {
            match &entry.error {
                None => {
                    let _ = writeln!(out, "  [{}] {} <- {}", index, entry.url, entry.source_url);
                }
                Some(error) => {
                    let _ = writeln!(out, "  [{}] FAILED {} ({})", index, entry.source_url, error);
                }
            }
        }
        out
    }
}

impl From<&CrawlOutcome> for RunResponse {
    fn from(outcome: &CrawlOutcome) -> Self {
        Self::new(outcome.run_id.clone(), &outcome.artifacts)
    }
}

impl From<&RunView> for RunResponse {
    fn from(view: &RunView) -> Self {
        Self::new(view.run_id.clone(), &view.artifacts)
    }
}
