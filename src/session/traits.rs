//! Rendering capability traits and error types
//!
//! The crawler only ever talks to these traits. A provider opens sessions, a
//! session hands out pages, and every page belongs to exactly one capture.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while driving a rendering backend
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch renderer: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("No document loaded in page")]
    NoDocument,

    #[error("Failed to read anchors: {0}")]
    Evaluation(String),

    #[error("Failed to write artifact {path}: {message}")]
    Screenshot { path: String, message: String },

    #[error("Session is closed")]
    Closed,

    #[error("Renderer error: {0}")]
    Backend(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Creates isolated browsing contexts
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// File extension of the artifacts this backend writes (without the dot)
    fn artifact_extension(&self) -> &'static str;

    /// Opens a new session; the caller must [`Session::close`] it
    async fn open(&self) -> RenderResult<Arc<dyn Session>>;
}

/// An isolated browsing context shared by the captures of one run
#[async_trait]
pub trait Session: Send + Sync {
    /// Opens a page that belongs to the caller alone
    async fn new_page(&self) -> RenderResult<Box<dyn Page>>;

    /// Releases the session; pages opened from it become unusable
    async fn close(&self) -> RenderResult<()>;
}

/// A single tab within a session
#[async_trait]
pub trait Page: Send {
    /// Loads `url` and waits for the document to be ready
    async fn goto(&mut self, url: &str) -> RenderResult<()>;

    /// Returns up to `limit` anchor targets of the loaded document, in
    /// document order
    async fn anchor_targets(&mut self, limit: usize) -> RenderResult<Vec<String>>;

    /// Writes the artifact for the loaded document to `path`
    async fn screenshot(&mut self, path: &Path) -> RenderResult<()>;

    /// Closes the page. Calling it more than once is a no-op.
    async fn close(&mut self) -> RenderResult<()>;
}
