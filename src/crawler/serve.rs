//! Long-lived request loop
//!
//! Reads one JSON request per line and writes one JSON reply per line. A
//! single process keeps its provider, store and cache across requests, so a
//! lookup after a crawl is answered from the cache primed by that crawl.

use crate::crawler::lookup::{LookupSource, RunLookup};
use crate::crawler::orchestrator::Orchestrator;
use crate::crawler::request::CrawlRequest;
use crate::output::{RunResponse, ScreenshotEntry};
use crate::run::RunId;
use crate::SnapError;
use serde::{Deserialize, Serialize};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// One line of input
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ServeRequest {
    Crawl(CrawlRequest),
    Lookup { run_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    NotFound,
    Error,
}

/// One line of output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServeReply {
    pub status: ReplyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshots: Option<Vec<ScreenshotEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<LookupSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServeReply {
    fn run(response: RunResponse, source: Option<LookupSource>) -> Self {
        Self {
            status: ReplyStatus::Ok,
            run_id: Some(response.run_id),
            screenshots: Some(response.screenshots),
            source,
            error: None,
        }
    }

    fn not_found(run_id: RunId) -> Self {
        Self {
            status: ReplyStatus::NotFound,
            run_id: Some(run_id),
            screenshots: None,
            source: None,
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            status: ReplyStatus::Error,
            run_id: None,
            screenshots: None,
            source: None,
            error: Some(message),
        }
    }

    fn from_crawl_error(err: SnapError) -> Self {
        let message = err.to_string();
        match err {
            // Captures exist on disk even though the run was not stored
            SnapError::Persistence {
                run_id, artifacts, ..
            } => {
                let response = RunResponse::new(run_id, &artifacts);
                Self {
                    run_id: Some(response.run_id),
                    screenshots: Some(response.screenshots),
                    ..Self::error(message)
                }
            }
            SnapError::SessionUnavailable { run_id, .. } | SnapError::StartPage { run_id, .. } => Self {
                run_id: Some(run_id),
                ..Self::error(message)
            },
            _ => Self::error(message),
        }
    }
}

/// Answers requests from `input` until EOF
///
/// Requests are handled one at a time in arrival order. A malformed line
/// gets an error reply and does not end the loop.
///
/// # Returns
///
/// * `Ok(usize)` - Number of requests answered
/// * `Err(io::Error)` - Reading input or writing a reply failed
pub async fn serve<R, W>(
    orchestrator: &Orchestrator,
    lookup: &RunLookup,
    input: R,
    mut output: W,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut handled = 0;

    tracing::info!("Serving requests");

    while let Some(raw) = lines.next_line().await? {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        let reply = handle(orchestrator, lookup, line).await;
        let mut encoded = serde_json::to_string(&reply)?;
        encoded.push('\n');
        output.write_all(encoded.as_bytes()).await?;
        output.flush().await?;
        handled += 1;
    }

    tracing::info!("Input closed after {} requests", handled);
    Ok(handled)
}

async fn handle(orchestrator: &Orchestrator, lookup: &RunLookup, line: &str) -> ServeReply {
    let request = match serde_json::from_str::<ServeRequest>(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejected malformed request: {}", e);
            return ServeReply::error(format!("malformed request: {e}"));
        }
    };

    match request {
        ServeRequest::Crawl(request) => match orchestrator.crawl(&request).await {
            Ok(outcome) => ServeReply::run(RunResponse::from(&outcome), None),
            Err(e) => ServeReply::from_crawl_error(e),
        },
        ServeRequest::Lookup { run_id } => {
            let run_id = RunId::from(run_id);
            match lookup.lookup(&run_id).await {
                Ok(Some(view)) => ServeReply::run(RunResponse::from(&view), Some(view.source)),
                Ok(None) => ServeReply::not_found(run_id),
                Err(e) => ServeReply::error(e.to_string()),
            }
        }
    }
}
