//! Single-page capture
//!
//! A worker opens its own page on the shared session, navigates, writes the
//! artifact and closes the page. Page acquisition, navigation and the
//! screenshot share one deadline.

use crate::run::FailureKind;
use crate::session::{Page, Session};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, timeout_at, Instant};

/// Upper bound on closing a page after capture
const PAGE_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Why a single capture did not produce an artifact
#[derive(Debug, Clone, Error)]
#[error("{kind} failure capturing {url}: {message}")]
pub struct CaptureFailure {
    pub url: String,
    pub kind: FailureKind,
    pub message: String,
}

impl CaptureFailure {
    pub fn new(url: &str, kind: FailureKind, message: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            kind,
            message: message.to_string(),
        }
    }
}

/// Captures pages on a shared session
#[derive(Clone)]
pub struct CaptureWorker {
    session: Arc<dyn Session>,
    page_timeout: Duration,
}

impl CaptureWorker {
    pub fn new(session: Arc<dyn Session>, page_timeout: Duration) -> Self {
        Self {
            session,
            page_timeout,
        }
    }

    /// Navigates to `url` on a fresh page and writes its artifact to
    /// `destination`
    ///
    /// The page is closed on every path, including timeouts.
    pub async fn capture(&self, url: &str, destination: &Path) -> Result<PathBuf, CaptureFailure> {
        let deadline = Instant::now() + self.page_timeout;

        let mut page = match timeout_at(deadline, self.session.new_page()).await {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(CaptureFailure::new(url, FailureKind::Session, e)),
            Err(_) => return Err(self.timed_out(url)),
        };

        let result = match timeout_at(deadline, render(page.as_mut(), url, destination)).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out(url)),
        };

        match timeout(PAGE_CLOSE_GRACE, page.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to close page for {}: {}", url, e),
            Err(_) => tracing::warn!("Timed out closing page for {}", url),
        }

        result.map(|()| destination.to_path_buf())
    }

    fn timed_out(&self, url: &str) -> CaptureFailure {
        CaptureFailure::new(
            url,
            FailureKind::Timeout,
            format!("no result within {} ms", self.page_timeout.as_millis()),
        )
    }
}

async fn render(page: &mut dyn Page, url: &str, destination: &Path) -> Result<(), CaptureFailure> {
    page.goto(url)
        .await
        .map_err(|e| CaptureFailure::new(url, FailureKind::Navigation, e))?;

    page.screenshot(destination)
        .await
        .map_err(|e| CaptureFailure::new(url, FailureKind::Screenshot, e))
}
