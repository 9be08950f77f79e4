use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for snapcrawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub renderer: RendererConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Which rendering backend drives page loads and captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererBackend {
    /// Plain HTTP fetch; artifacts are HTML snapshots
    Http,
    /// Headless Chrome; artifacts are PNG screenshots
    Chromium,
}

/// Page rendering configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RendererConfig {
    #[serde(default = "default_backend")]
    pub backend: RendererBackend,

    /// User agent sent with every page load
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Upper bound for a single capture, page acquisition included (milliseconds)
    #[serde(rename = "page-timeout-ms", default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Maximum number of pages rendered at the same time within one run
    #[serde(
        rename = "max-concurrent-captures",
        default = "default_max_concurrent_captures"
    )]
    pub max_concurrent_captures: usize,

    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl RendererConfig {
    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving the captured artifacts
    #[serde(rename = "artifact-dir")]
    pub artifact_dir: String,
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live of a cached run (seconds)
    #[serde(rename = "ttl-secs", default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of runs held in memory
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Re-prime the cache when a lookup falls through to the store
    #[serde(rename = "reprime-on-miss", default)]
    pub reprime_on_miss: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
            reprime_on_miss: false,
        }
    }
}

fn default_backend() -> RendererBackend {
    RendererBackend::Chromium
}

fn default_user_agent() -> String {
    format!("snapcrawl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_page_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrent_captures() -> usize {
    8
}

fn default_headless() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_capacity() -> usize {
    1024
}
