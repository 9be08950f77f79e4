//! Headless Chrome rendering backend
//!
//! One browser process per session, one tab per page. The CDP event handler
//! runs on its own task and is aborted when the session closes.

use crate::session::traits::{Page, RenderError, RenderResult, Session, SessionProvider};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, CaptureScreenshotParams};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Collects the resolved `href` of every anchor, in document order
const ANCHOR_SCRIPT: &str = r#"
    () => Array.from(document.querySelectorAll('a[href]')).map(link => link.href)
"#;

/// Configuration for launched browsers
#[derive(Debug, Clone)]
pub struct ChromiumOptions {
    pub headless: bool,
    pub user_agent: String,
    pub request_timeout: Duration,
}

/// Session provider that launches a headless Chrome per session
#[derive(Debug, Clone)]
pub struct ChromiumSessionProvider {
    options: ChromiumOptions,
}

impl ChromiumSessionProvider {
    pub fn new(options: ChromiumOptions) -> Self {
        Self { options }
    }

    fn browser_config(&self) -> RenderResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.options.request_timeout)
            .window_size(1920, 1080)
            .no_sandbox()
            .arg(format!("--user-agent={}", self.options.user_agent))
            .arg("--disable-dev-shm-usage")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-web-security")
            .arg("--disable-features=IsolateOrigins,site-per-process")
            .arg("--hide-scrollbars")
            .arg("--mute-audio");

        if !self.options.headless {
            builder = builder.with_head();
        }

        builder.build().map_err(RenderError::Launch)
    }
}

#[async_trait]
impl SessionProvider for ChromiumSessionProvider {
    fn artifact_extension(&self) -> &'static str {
        "png"
    }

    async fn open(&self) -> RenderResult<Arc<dyn Session>> {
        let config = self.browser_config()?;

        info!("Launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {:?}", e);
                }
            }
            debug!("Browser event handler task completed");
        });

        Ok(Arc::new(ChromiumSession {
            browser: RwLock::new(Some(browser)),
            handler: Mutex::new(Some(handler_task)),
        }))
    }
}

struct ChromiumSession {
    browser: RwLock<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Session for ChromiumSession {
    async fn new_page(&self) -> RenderResult<Box<dyn Page>> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().ok_or(RenderError::Closed)?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Backend(format!("Failed to open tab: {e}")))?;
        Ok(Box::new(ChromiumPage { page: Some(page) }))
    }

    async fn close(&self) -> RenderResult<()> {
        let browser = self.browser.write().await.take();
        let result = match browser {
            Some(mut browser) => {
                let closed = browser.close().await.map(|_| ());
                if let Err(e) = browser.wait().await {
                    warn!("Browser process did not exit cleanly: {}", e);
                }
                closed.map_err(|e| RenderError::Backend(format!("Failed to close browser: {e}")))
            }
            None => Ok(()),
        };

        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }

        result
    }
}

struct ChromiumPage {
    page: Option<chromiumoxide::Page>,
}

impl ChromiumPage {
    fn page(&self) -> RenderResult<&chromiumoxide::Page> {
        self.page.as_ref().ok_or(RenderError::Closed)
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(&mut self, url: &str) -> RenderResult<()> {
        self.page()?
            .goto(url)
            .await
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn anchor_targets(&mut self, limit: usize) -> RenderResult<Vec<String>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let result = self
            .page()?
            .evaluate_function(ANCHOR_SCRIPT)
            .await
            .map_err(|e| RenderError::Evaluation(e.to_string()))?;

        let mut links: Vec<String> = result
            .into_value()
            .map_err(|e| RenderError::Evaluation(e.to_string()))?;
        links.truncate(limit);
        Ok(links)
    }

    async fn screenshot(&mut self, path: &Path) -> RenderResult<()> {
        let params = CaptureScreenshotParams {
            format: Some(CaptureScreenshotFormat::Png),
            capture_beyond_viewport: Some(true),
            ..Default::default()
        };

        let bytes = self
            .page()?
            .screenshot(params)
            .await
            .map_err(|e| RenderError::Screenshot {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| RenderError::Screenshot {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    async fn close(&mut self) -> RenderResult<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                error!("Failed to close browser tab: {}", e);
                return Err(RenderError::Backend(format!("Failed to close tab: {e}")));
            }
        }
        Ok(())
    }
}
