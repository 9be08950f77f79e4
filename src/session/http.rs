//! HTTP rendering backend
//!
//! Loads documents with a shared `reqwest` client and writes the fetched HTML
//! as the page artifact. No JavaScript is executed, so anchors are the ones
//! present in the served markup.

use crate::session::html::extract_anchor_targets;
use crate::session::traits::{Page, RenderError, RenderResult, Session, SessionProvider};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Builds the HTTP client shared by every session of a provider
///
/// # Arguments
///
/// * `user_agent` - Value of the `User-Agent` header
/// * `timeout` - Request timeout applied by the client itself
///
/// # Example
///
/// ```no_run
/// use snapcrawl::session::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client("snapcrawl/1.0", Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Session provider backed by plain HTTP fetches
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    client: Client,
}

impl HttpSessionProvider {
    /// Wraps an existing client; its connection pool is shared by all sessions
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a provider with its own client
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> RenderResult<Self> {
        Ok(Self::new(build_http_client(user_agent, timeout)?))
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    fn artifact_extension(&self) -> &'static str {
        "html"
    }

    async fn open(&self) -> RenderResult<Arc<dyn Session>> {
        Ok(Arc::new(HttpSession {
            client: self.client.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

struct HttpSession {
    client: Client,
    closed: AtomicBool,
}

#[async_trait]
impl Session for HttpSession {
    async fn new_page(&self) -> RenderResult<Box<dyn Page>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RenderError::Closed);
        }
        Ok(Box::new(HttpPage {
            client: self.client.clone(),
            document: None,
        }))
    }

    async fn close(&self) -> RenderResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// A fetched document
struct LoadedDocument {
    /// Final URL after redirects, used to resolve relative hrefs
    url: Url,
    body: String,
}

struct HttpPage {
    client: Client,
    document: Option<LoadedDocument>,
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str) -> RenderResult<()> {
        self.document = None;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| navigation_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| navigation_error(url, &e))?;

        self.document = Some(LoadedDocument {
            url: final_url,
            body,
        });
        Ok(())
    }

    async fn anchor_targets(&mut self, limit: usize) -> RenderResult<Vec<String>> {
        let document = self.document.as_ref().ok_or(RenderError::NoDocument)?;
        Ok(extract_anchor_targets(&document.body, &document.url, limit))
    }

    async fn screenshot(&mut self, path: &Path) -> RenderResult<()> {
        let document = self.document.as_ref().ok_or(RenderError::NoDocument)?;
        tokio::fs::write(path, document.body.as_bytes())
            .await
            .map_err(|e| RenderError::Screenshot {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    async fn close(&mut self) -> RenderResult<()> {
        self.document = None;
        Ok(())
    }
}

/// Classifies a transport error the way it is reported on a failed capture
fn navigation_error(url: &str, error: &reqwest::Error) -> RenderError {
    let message = if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else {
        error.to_string()
    };

    RenderError::Navigation {
        url: url.to_string(),
        message,
    }
}
