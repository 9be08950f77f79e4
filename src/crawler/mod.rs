//! Crawler module for crawl-and-capture runs
//!
//! This module contains the core run logic, including:
//! - Request validation
//! - Link extraction from the start page
//! - Concurrent page capture with per-page timeouts
//! - Persistence and cache priming of finished runs
//! - Cache-first retrieval of finished runs
//! - A long-lived request loop sharing one cache across requests

mod capture;
mod link_extractor;
mod lookup;
mod orchestrator;
mod request;
mod serve;

pub use capture::{CaptureFailure, CaptureWorker};
pub use link_extractor::extract_links;
pub use lookup::{LookupSource, RunLookup, RunView};
pub use orchestrator::{CrawlOutcome, CrawlSettings, Orchestrator};
pub use request::{CrawlRequest, ValidatedRequest};
pub use serve::{serve, ReplyStatus, ServeReply, ServeRequest};

use crate::cache::{MemoryResultCache, ResultCache};
use crate::config::Config;
use crate::session::provider_from_config;
use crate::storage::{open_store, ArtifactStore};
use crate::SnapError;
use std::path::Path;
use std::sync::Arc;

/// Opens the store and cache shared by both sides of the service
fn open_shared(config: &Config) -> Result<(Arc<dyn ArtifactStore>, Arc<dyn ResultCache>), SnapError> {
    let store: Arc<dyn ArtifactStore> = Arc::new(open_store(Path::new(&config.output.database_path))?);
    let cache: Arc<dyn ResultCache> =
        Arc::new(MemoryResultCache::new(config.cache.capacity, config.cache.ttl_secs));
    Ok((store, cache))
}

/// Builds the write and read sides of the service from a configuration
///
/// The provider, store and cache are created once here and shared by both
/// halves for the lifetime of the process.
///
/// # Arguments
///
/// * `config` - A validated configuration
///
/// # Returns
///
/// * `Ok((Orchestrator, RunLookup))` - Ready to serve runs
/// * `Err(SnapError)` - Backend unavailable or store could not be opened
pub fn build_service(config: &Config) -> Result<(Orchestrator, RunLookup), SnapError> {
    let provider = provider_from_config(&config.renderer)?;
    let (store, cache) = open_shared(config)?;

    let orchestrator = Orchestrator::new(
        provider,
        Arc::clone(&store),
        Arc::clone(&cache),
        CrawlSettings::from_config(config),
    );
    let lookup = RunLookup::new(store, cache).with_reprime_on_miss(config.cache.reprime_on_miss);

    Ok((orchestrator, lookup))
}

/// Builds only the read side; no rendering backend is constructed
pub fn build_lookup(config: &Config) -> Result<RunLookup, SnapError> {
    let (store, cache) = open_shared(config)?;
    Ok(RunLookup::new(store, cache).with_reprime_on_miss(config.cache.reprime_on_miss))
}
