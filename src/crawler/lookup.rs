//! Retrieval of finished runs
//!
//! Reads go to the cache first and fall back to the durable store on a miss,
//! an expired entry or a cache error.

use crate::cache::ResultCache;
use crate::run::{Artifact, RunId};
use crate::storage::ArtifactStore;
use crate::SnapError;
use serde::Serialize;
use std::sync::Arc;

/// Where a lookup found its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupSource {
    Cache,
    Store,
}

/// Artifacts of a finished run
///
/// Equality compares the run only; `source` describes where this particular
/// read was answered from.
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    pub run_id: RunId,
    pub artifacts: Vec<Artifact>,
    #[serde(skip)]
    pub source: LookupSource,
}

impl PartialEq for RunView {
    fn eq(&self, other: &Self) -> bool {
        self.run_id == other.run_id && self.artifacts == other.artifacts
    }
}

impl Eq for RunView {}

/// Read side of the crawl service
pub struct RunLookup {
    store: Arc<dyn ArtifactStore>,
    cache: Arc<dyn ResultCache>,
    reprime_on_miss: bool,
}

impl RunLookup {
    pub fn new(store: Arc<dyn ArtifactStore>, cache: Arc<dyn ResultCache>) -> Self {
        Self {
            store,
            cache,
            reprime_on_miss: false,
        }
    }

    /// Pushes store hits back into the cache
    pub fn with_reprime_on_miss(mut self, reprime_on_miss: bool) -> Self {
        self.reprime_on_miss = reprime_on_miss;
        self
    }

    /// Returns the artifacts of `run_id`, or `None` if no such run exists
    ///
    /// Lookups never mutate the stored run, so repeated calls return the
    /// same artifacts.
    pub async fn lookup(&self, run_id: &RunId) -> Result<Option<RunView>, SnapError> {
        match self.cache.range(run_id).await {
            Ok(artifacts) if !artifacts.is_empty() => {
                tracing::debug!("Cache hit for run {}", run_id);
                return Ok(Some(RunView {
                    run_id: run_id.clone(),
                    artifacts,
                    source: LookupSource::Cache,
                }));
            }
            Ok(_) => tracing::debug!("Cache miss for run {}", run_id),
            Err(e) => tracing::warn!("Cache read failed for run {}, using store: {}", run_id, e),
        }

        let Some(record) = self.store.get(run_id).await? else {
            tracing::info!("Run {} not found", run_id);
            return Ok(None);
        };

        if self.reprime_on_miss && !record.artifacts.is_empty() {
            if let Err(e) = self.cache.push(&record.run_id, &record.artifacts).await {
                tracing::warn!("Failed to re-prime cache for run {}: {}", run_id, e);
            }
        }

        Ok(Some(RunView {
            run_id: record.run_id,
            artifacts: record.artifacts,
            source: LookupSource::Store,
        }))
    }
}
