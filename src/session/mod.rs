//! Rendering session capability
//!
//! This module defines the session/page traits the crawler drives and ships
//! the concrete backends:
//! - `HttpSessionProvider`: plain HTTP fetch, HTML snapshot artifacts
//! - `ChromiumSessionProvider` (feature `chromium`): headless Chrome, PNG
//!   screenshots

#[cfg(feature = "chromium")]
mod chromium;
mod html;
mod http;
mod traits;

#[cfg(feature = "chromium")]
pub use chromium::{ChromiumOptions, ChromiumSessionProvider};
pub use html::extract_anchor_targets;
pub use http::{build_http_client, HttpSessionProvider};
pub use traits::{Page, RenderError, RenderResult, Session, SessionProvider};

use crate::config::{RendererBackend, RendererConfig};
use crate::ConfigError;
use std::sync::Arc;

/// Builds the session provider selected in the configuration
///
/// The provider is created once per process; its HTTP client or browser
/// settings are shared by every run.
pub fn provider_from_config(config: &RendererConfig) -> Result<Arc<dyn SessionProvider>, ConfigError> {
    match config.backend {
        RendererBackend::Http => {
            let provider = HttpSessionProvider::with_user_agent(&config.user_agent, config.page_timeout())
                .map_err(|e| ConfigError::Validation(format!("Failed to build HTTP client: {e}")))?;
            Ok(Arc::new(provider))
        }
        #[cfg(feature = "chromium")]
        RendererBackend::Chromium => Ok(Arc::new(ChromiumSessionProvider::new(ChromiumOptions {
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            request_timeout: config.page_timeout(),
        }))),
        #[cfg(not(feature = "chromium"))]
        RendererBackend::Chromium => Err(ConfigError::UnsupportedBackend(
            "chromium (rebuild with --features chromium)".to_string(),
        )),
    }
}
