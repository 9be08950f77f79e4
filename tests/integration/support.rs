//! Scripted collaborators for orchestration tests

use async_trait::async_trait;
use snapcrawl::crawler::{CrawlSettings, Orchestrator, RunLookup};
use snapcrawl::run::{RunId, RunRecord};
use snapcrawl::session::{Page, RenderError, RenderResult, Session, SessionProvider};
use snapcrawl::storage::{ArtifactStore, StorageError, StorageResult};
use snapcrawl::{MemoryResultCache, ResultCache};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const START_URL: &str = "https://example.com/";

/// Absolute link targets `https://example.com/link{i}` for `i` in `1..=count`
pub fn links(count: usize) -> Vec<String> {
    (1..=count)
        .map(|i| format!("https://example.com/link{i}"))
        .collect()
}

/// Counters shared by every session and page a [`FakeProvider`] hands out
#[derive(Default)]
pub struct Counters {
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub anchor_reads: AtomicUsize,
    open_pages: AtomicUsize,
    pub max_open_pages: AtomicUsize,
    pub screenshots: Mutex<Vec<PathBuf>>,
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

#[derive(Default)]
struct Script {
    anchors: Vec<String>,
    unavailable: bool,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    panicking: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// Session provider whose page behaviour is scripted per URL
#[derive(Clone)]
pub struct FakeProvider {
    script: Arc<Script>,
    pub counters: Arc<Counters>,
}

impl FakeProvider {
    pub fn with_anchors(anchors: Vec<String>) -> FakeBuilder {
        FakeBuilder {
            script: Script {
                anchors,
                ..Script::default()
            },
        }
    }
}

pub struct FakeBuilder {
    script: Script,
}

impl FakeBuilder {
    /// Navigation to `url` fails
    pub fn failing(mut self, url: &str) -> Self {
        self.script.failing.insert(url.to_string());
        self
    }

    /// Navigation to `url` never completes
    pub fn hanging(mut self, url: &str) -> Self {
        self.script.hanging.insert(url.to_string());
        self
    }

    /// Navigation to `url` panics
    pub fn panicking(mut self, url: &str) -> Self {
        self.script.panicking.insert(url.to_string());
        self
    }

    pub fn delayed(mut self, url: &str, millis: u64) -> Self {
        self.script
            .delays
            .insert(url.to_string(), Duration::from_millis(millis));
        self
    }

    /// Opening a session fails
    pub fn unavailable(mut self) -> Self {
        self.script.unavailable = true;
        self
    }

    pub fn build(self) -> FakeProvider {
        FakeProvider {
            script: Arc::new(self.script),
            counters: Arc::new(Counters::default()),
        }
    }
}

#[async_trait]
impl SessionProvider for FakeProvider {
    fn artifact_extension(&self) -> &'static str {
        "png"
    }

    async fn open(&self) -> RenderResult<Arc<dyn Session>> {
        if self.script.unavailable {
            return Err(RenderError::Launch("browser not installed".to_string()));
        }
        self.counters.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeSession {
            script: Arc::clone(&self.script),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeSession {
    script: Arc<Script>,
    counters: Arc<Counters>,
}

#[async_trait]
impl Session for FakeSession {
    async fn new_page(&self) -> RenderResult<Box<dyn Page>> {
        self.counters.pages_opened.fetch_add(1, Ordering::SeqCst);
        let open = self.counters.open_pages.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_open_pages.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            script: Arc::clone(&self.script),
            counters: Arc::clone(&self.counters),
            current: None,
            closed: false,
        }))
    }

    async fn close(&self) -> RenderResult<()> {
        self.counters.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    script: Arc<Script>,
    counters: Arc<Counters>,
    current: Option<String>,
    closed: bool,
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&mut self, url: &str) -> RenderResult<()> {
        if let Some(delay) = self.script.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.script.hanging.contains(url) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.script.panicking.contains(url) {
            panic!("renderer crashed on {url}");
        }
        if self.script.failing.contains(url) {
            return Err(RenderError::Navigation {
                url: url.to_string(),
                message: "HTTP 500".to_string(),
            });
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn anchor_targets(&mut self, limit: usize) -> RenderResult<Vec<String>> {
        self.counters.anchor_reads.fetch_add(1, Ordering::SeqCst);
        if self.current.is_none() {
            return Err(RenderError::NoDocument);
        }
        Ok(self.script.anchors.iter().take(limit).cloned().collect())
    }

    async fn screenshot(&mut self, path: &Path) -> RenderResult<()> {
        if self.current.is_none() {
            return Err(RenderError::NoDocument);
        }
        self.counters
            .screenshots
            .lock()
            .unwrap()
            .push(path.to_path_buf());
        Ok(())
    }

    async fn close(&mut self) -> RenderResult<()> {
        if !self.closed {
            self.closed = true;
            self.counters.pages_closed.fetch_add(1, Ordering::SeqCst);
            self.counters.open_pages.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// In-memory store that records every successful put
#[derive(Default)]
pub struct RecordingStore {
    records: Mutex<HashMap<RunId, RunRecord>>,
}

impl RecordingStore {
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for RecordingStore {
    async fn put(&self, record: &RunRecord) -> StorageResult<()> {
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&record.run_id) {
            return Err(StorageError::DuplicateRun(record.run_id.clone()));
        }
        records.insert(record.run_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, run_id: &RunId) -> StorageResult<Option<RunRecord>> {
        Ok(self.records.lock().unwrap().get(run_id).cloned())
    }
}

/// Store whose writes always fail
pub struct FailingStore;

#[async_trait]
impl ArtifactStore for FailingStore {
    async fn put(&self, _record: &RunRecord) -> StorageResult<()> {
        Err(StorageError::Database("disk I/O error".to_string()))
    }

    async fn get(&self, _run_id: &RunId) -> StorageResult<Option<RunRecord>> {
        Ok(None)
    }
}

pub fn settings(artifact_dir: &Path) -> CrawlSettings {
    CrawlSettings {
        artifact_dir: artifact_dir.to_path_buf(),
        page_timeout: Duration::from_secs(5),
        max_concurrent_captures: 8,
    }
}

/// Orchestrator and lookup wired to a fake provider, a recording store and a
/// memory cache
pub struct Harness {
    pub provider: FakeProvider,
    pub store: Arc<RecordingStore>,
    pub cache: Arc<MemoryResultCache>,
    pub orchestrator: Orchestrator,
    pub lookup: RunLookup,
}

impl Harness {
    pub fn new(provider: FakeProvider, settings: CrawlSettings) -> Self {
        let store = Arc::new(RecordingStore::default());
        let cache = Arc::new(MemoryResultCache::new(16, 60));
        let orchestrator = Orchestrator::new(
            Arc::new(provider.clone()),
            store.clone(),
            cache.clone(),
            settings,
        );
        let lookup = RunLookup::new(store.clone(), cache.clone() as Arc<dyn ResultCache>);
        Self {
            provider,
            store,
            cache,
            orchestrator,
            lookup,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.provider.counters
    }
}
