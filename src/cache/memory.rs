//! In-process result cache
//!
//! Bounded LRU of recently finished runs. Entries expire after a fixed TTL
//! measured from the moment they were pushed.

use crate::cache::traits::{CacheError, CacheResult, ResultCache};
use crate::run::{Artifact, RunId};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Artifacts of one run along with the time they were cached
#[derive(Debug, Clone)]
pub struct CachedRun {
    pub artifacts: Vec<Artifact>,
    pub cached_at: DateTime<Utc>,
}

impl CachedRun {
    pub fn new(artifacts: Vec<Artifact>) -> Self {
        Self {
            artifacts,
            cached_at: Utc::now(),
        }
    }

    /// Checks if the entry is older than `ttl`
    pub fn is_stale(&self, ttl: Duration) -> bool {
        Utc::now() - self.cached_at > ttl
    }
}

/// Result cache held in memory and shared across requests
///
/// Create one per process and hand it out behind an `Arc`.
pub struct MemoryResultCache {
    entries: Mutex<LruCache<RunId, CachedRun>>,
    ttl: Duration,
}

impl MemoryResultCache {
    /// Creates a cache holding at most `capacity` runs for `ttl_secs` seconds
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let ttl_secs = i64::try_from(ttl_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Number of entries currently held, stale ones included
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn backdate(&self, run_id: &RunId, age: Duration) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(run_id) {
            entry.cached_at = Utc::now() - age;
        }
    }
}

#[async_trait]
impl ResultCache for MemoryResultCache {
    async fn push(&self, run_id: &RunId, artifacts: &[Artifact]) -> CacheResult<()> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        entries.put(run_id.clone(), CachedRun::new(artifacts.to_vec()));
        Ok(())
    }

    async fn range(&self, run_id: &RunId) -> CacheResult<Vec<Artifact>> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;

        let stale = match entries.get(run_id) {
            Some(entry) if !entry.is_stale(self.ttl) => return Ok(entry.artifacts.clone()),
            Some(_) => true,
            None => false,
        };

        if stale {
            entries.pop(run_id);
        }
        Ok(Vec::new())
    }
}
