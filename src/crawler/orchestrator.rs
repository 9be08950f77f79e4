//! Crawl orchestration
//!
//! One call to [`Orchestrator::crawl`] is one run:
//! - validate the request and mint a run id
//! - open a session and load the start page
//! - read up to N anchor targets
//! - capture the start page and every link concurrently
//! - persist the ordered artifact list, then prime the cache

use crate::cache::ResultCache;
use crate::config::Config;
use crate::crawler::capture::{CaptureFailure, CaptureWorker};
use crate::crawler::link_extractor::extract_links;
use crate::crawler::request::{CrawlRequest, ValidatedRequest};
use crate::run::{artifact_file_name, Artifact, FailureKind, RunId, RunRecord};
use crate::session::{RenderError, Session, SessionProvider};
use crate::storage::ArtifactStore;
use crate::SnapError;
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Knobs the orchestrator needs from the configuration
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub artifact_dir: PathBuf,
    pub page_timeout: Duration,
    pub max_concurrent_captures: usize,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            artifact_dir: PathBuf::from(&config.output.artifact_dir),
            page_timeout: config.renderer.page_timeout(),
            max_concurrent_captures: config.renderer.max_concurrent_captures,
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlOutcome {
    pub run_id: RunId,
    pub artifacts: Vec<Artifact>,
}

impl CrawlOutcome {
    pub fn failed_count(&self) -> usize {
        self.artifacts.iter().filter(|a| !a.is_success()).count()
    }
}

/// One page to capture, with its fixed position in the run
#[derive(Debug, Clone)]
struct CaptureTarget {
    index: usize,
    url: String,
    file_name: String,
    destination: PathBuf,
}

/// Drives crawl runs against injected collaborators
///
/// Provider, store and cache are created once per process and shared by all
/// runs; nothing here is global.
pub struct Orchestrator {
    provider: Arc<dyn SessionProvider>,
    store: Arc<dyn ArtifactStore>,
    cache: Arc<dyn ResultCache>,
    settings: CrawlSettings,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn SessionProvider>,
        store: Arc<dyn ArtifactStore>,
        cache: Arc<dyn ResultCache>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            provider,
            store,
            cache,
            settings,
        }
    }

    /// Runs one crawl to completion
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - Run persisted; artifacts are ordered by index and
    ///   failed captures carry their failure marker
    /// * `Err(SnapError)` - Validation, session, start page or persistence
    ///   failure; nothing is cached in any of these cases
    pub async fn crawl(&self, request: &CrawlRequest) -> Result<CrawlOutcome, SnapError> {
        let validated = request.validate()?;
        let run_id = RunId::generate();

        tracing::info!(
            "Starting crawl run {} (start url: {}, links to follow: {})",
            run_id,
            validated.start_url,
            validated.link_count
        );

        tokio::fs::create_dir_all(&self.settings.artifact_dir).await?;

        let session = self.provider.open().await.map_err(|source| {
            tracing::error!("Could not open rendering session for run {}: {}", run_id, source);
            SnapError::SessionUnavailable {
                run_id: run_id.clone(),
                source,
            }
        })?;

        let captured = self.run_in_session(&run_id, &validated, &session).await;

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close session for run {}: {}", run_id, e);
        }

        let artifacts = captured?;
        self.persist(RunRecord::new(
            run_id,
            validated.start_url.to_string(),
            validated.link_count,
            artifacts,
        ))
        .await
    }

    async fn run_in_session(
        &self,
        run_id: &RunId,
        validated: &ValidatedRequest,
        session: &Arc<dyn Session>,
    ) -> Result<Vec<Artifact>, SnapError> {
        let links = self.load_start_page(run_id, validated, session.as_ref()).await?;
        let targets = self.build_targets(run_id, validated.start_url.as_str(), links);
        Ok(self.capture_all(run_id, session, targets).await)
    }

    /// Loads the start page on its own page and reads its anchor targets
    async fn load_start_page(
        &self,
        run_id: &RunId,
        validated: &ValidatedRequest,
        session: &dyn Session,
    ) -> Result<Vec<String>, SnapError> {
        let start_url = validated.start_url.as_str();
        let start_page_error = |source: RenderError| {
            tracing::error!("Start page {} failed for run {}: {}", start_url, run_id, source);
            SnapError::StartPage {
                run_id: run_id.clone(),
                url: start_url.to_string(),
                source,
            }
        };

        let mut page = session.new_page().await.map_err(start_page_error)?;

        let loaded = match timeout(self.settings.page_timeout, page.goto(start_url)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::Navigation {
                url: start_url.to_string(),
                message: format!("timed out after {} ms", self.settings.page_timeout.as_millis()),
            }),
        };
        let links = match loaded {
            Ok(()) => extract_links(page.as_mut(), validated.link_count).await,
            Err(e) => Err(e),
        };

        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close start page for run {}: {}", run_id, e);
        }

        let links = links.map_err(start_page_error)?;

        tracing::info!("Extracted {} links from {}", links.len(), start_url);
        if links.len() < validated.link_count {
            tracing::warn!(
                "Run {} requested {} links but {} only has {}",
                run_id,
                validated.link_count,
                start_url,
                links.len()
            );
        }

        Ok(links)
    }

    fn build_targets(&self, run_id: &RunId, start_url: &str, links: Vec<String>) -> Vec<CaptureTarget> {
        let extension = self.provider.artifact_extension();

        std::iter::once(start_url.to_string())
            .chain(links)
            .enumerate()
            .map(|(index, url)| {
                let file_name = artifact_file_name(run_id, index, extension);
                let destination = self.settings.artifact_dir.join(&file_name);
                CaptureTarget {
                    index,
                    url,
                    file_name,
                    destination,
                }
            })
            .collect()
    }

    /// Captures every target concurrently and returns artifacts in target order
    ///
    /// All captures are dispatched before any is awaited. A semaphore bounds
    /// how many pages are open at once.
    async fn capture_all(
        &self,
        run_id: &RunId,
        session: &Arc<dyn Session>,
        targets: Vec<CaptureTarget>,
    ) -> Vec<Artifact> {
        let worker = CaptureWorker::new(Arc::clone(session), self.settings.page_timeout);
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_captures.max(1)));

        tracing::info!("Dispatching {} captures for run {}", targets.len(), run_id);

        let handles: Vec<JoinHandle<Result<PathBuf, CaptureFailure>>> = targets
            .iter()
            .map(|target| {
                let worker = worker.clone();
                let permits = Arc::clone(&permits);
                let url = target.url.clone();
                let destination = target.destination.clone();
                tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    worker.capture(&url, &destination).await
                })
            })
            .collect();

        let reports = join_all(handles).await;

        let artifacts: Vec<Artifact> = targets
            .into_iter()
            .zip(reports)
            .map(|(target, joined)| {
                let report = joined.unwrap_or_else(|e| {
                    Err(CaptureFailure::new(&target.url, FailureKind::Aborted, e))
                });
                match report {
                    Ok(path) => {
                        tracing::debug!("Captured {} to {}", target.url, path.display());
                        Artifact::captured(target.index, target.file_name, target.url)
                    }
                    Err(failure) => {
                        tracing::warn!("Could not capture {} for run {}: {}", target.url, run_id, failure);
                        Artifact::failed(
                            target.index,
                            target.file_name,
                            target.url,
                            failure.kind,
                            failure.message,
                        )
                    }
                }
            })
            .collect();

        let failed = artifacts.iter().filter(|a| !a.is_success()).count();
        tracing::info!(
            "Run {} captured {} of {} pages",
            run_id,
            artifacts.len() - failed,
            artifacts.len()
        );

        artifacts
    }

    /// Writes the run to the store, then primes the cache
    async fn persist(&self, record: RunRecord) -> Result<CrawlOutcome, SnapError> {
        tracing::info!(
            "Inserting run {} into store ({} artifacts, {} failed)",
            record.run_id,
            record.artifacts.len(),
            record.failed_count()
        );

        if let Err(source) = self.store.put(&record).await {
            let names: Vec<&str> = record.artifacts.iter().map(|a| a.file_name.as_str()).collect();
            tracing::error!(
                "Failed to persist run {}: {}. Captured artifacts: [{}]",
                record.run_id,
                source,
                names.join(", ")
            );
            return Err(SnapError::Persistence {
                run_id: record.run_id,
                artifacts: record.artifacts,
                source,
            });
        }

        if let Err(e) = self.cache.push(&record.run_id, &record.artifacts).await {
            tracing::warn!("Run {} stored but cache prime failed: {}", record.run_id, e);
        }

        tracing::info!("Crawl run {} complete", record.run_id);

        Ok(CrawlOutcome {
            run_id: record.run_id,
            artifacts: record.artifacts,
        })
    }
}
