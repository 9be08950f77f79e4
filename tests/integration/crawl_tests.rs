//! Integration tests for crawl runs
//!
//! Most tests drive the orchestrator with scripted sessions from `support`.
//! The last group runs the HTTP backend against a wiremock server and a
//! SQLite store on disk.

mod support;

use snapcrawl::config::{parse_config, Config};
use snapcrawl::crawler::{
    build_lookup, build_service, serve, CrawlRequest, CrawlSettings, LookupSource, Orchestrator,
    RunLookup,
};
use snapcrawl::output::RunResponse;
use snapcrawl::run::{CaptureOutcome, FailureKind, RunId};
use snapcrawl::session::HttpSessionProvider;
use snapcrawl::storage::open_store;
use snapcrawl::{MemoryResultCache, ResultCache, SnapError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use support::{count, links, settings, FailingStore, FakeProvider, Harness, START_URL};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn failure_kind(outcome: &CaptureOutcome) -> Option<FailureKind> {
    match outcome {
        CaptureOutcome::Captured => None,
        CaptureOutcome::Failed { kind, .. } => Some(*kind),
    }
}

#[tokio::test]
async fn test_crawl_returns_start_page_plus_requested_links() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(5)).build(), settings(dir.path()));

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 3))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 4);
    let expected_sources = [
        START_URL,
        "https://example.com/link1",
        "https://example.com/link2",
        "https://example.com/link3",
    ];
    for (i, artifact) in outcome.artifacts.iter().enumerate() {
        assert_eq!(artifact.index, i);
        assert_eq!(artifact.source_url, expected_sources[i]);
        assert_eq!(artifact.file_name, format!("{}_screenshot_{}.png", outcome.run_id, i));
        assert!(artifact.is_success());
    }

    // Every screenshot landed in the artifact directory
    let screenshots = harness.counters().screenshots.lock().unwrap().clone();
    assert_eq!(screenshots.len(), 4);
    assert!(screenshots.iter().all(|p| p.starts_with(dir.path())));

    // Persisted and cached under the run id
    assert_eq!(harness.store.len(), 1);
    let cached = harness.cache.range(&outcome.run_id).await.unwrap();
    assert_eq!(cached, outcome.artifacts);
}

#[tokio::test]
async fn test_sessions_and_pages_are_always_closed() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(4)).build(), settings(dir.path()));

    harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 4))
        .await
        .unwrap();

    let counters = harness.counters();
    assert_eq!(count(&counters.sessions_opened), 1);
    assert_eq!(count(&counters.sessions_closed), 1);
    // Start page load plus one page per target
    assert_eq!(count(&counters.pages_opened), 6);
    assert_eq!(count(&counters.pages_closed), 6);
}

#[tokio::test]
async fn test_index_alignment_survives_out_of_order_completion() {
    let dir = tempfile::tempdir().unwrap();
    let provider = FakeProvider::with_anchors(links(4))
        .delayed("https://example.com/link1", 300)
        .delayed("https://example.com/link2", 10)
        .delayed("https://example.com/link3", 150)
        .build();
    let harness = Harness::new(provider, settings(dir.path()));

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 4))
        .await
        .unwrap();

    let sources: Vec<&str> = outcome.artifacts.iter().map(|a| a.source_url.as_str()).collect();
    assert_eq!(
        sources,
        vec![
            START_URL,
            "https://example.com/link1",
            "https://example.com/link2",
            "https://example.com/link3",
            "https://example.com/link4",
        ]
    );
    for (i, artifact) in outcome.artifacts.iter().enumerate() {
        assert!(artifact.file_name.ends_with(&format!("_screenshot_{i}.png")));
    }
}

#[tokio::test]
async fn test_one_failed_link_keeps_its_slot() {
    let dir = tempfile::tempdir().unwrap();
    let provider = FakeProvider::with_anchors(links(5))
        .failing("https://example.com/link2")
        .build();
    let harness = Harness::new(provider, settings(dir.path()));

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 5))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 6);
    assert_eq!(outcome.failed_count(), 1);

    let failed = &outcome.artifacts[2];
    assert_eq!(failed.source_url, "https://example.com/link2");
    assert_eq!(failure_kind(&failed.outcome), Some(FailureKind::Navigation));

    // The failure marker is persisted with the run
    let view = harness.lookup.lookup(&outcome.run_id).await.unwrap().unwrap();
    assert_eq!(view.artifacts, outcome.artifacts);
    assert_eq!(count(&harness.counters().pages_closed), count(&harness.counters().pages_opened));
}

#[tokio::test]
async fn test_fewer_anchors_than_requested() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(2)).build(), settings(dir.path()));

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 5))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 3);
    assert!(outcome.artifacts.iter().all(|a| a.is_success()));
}

#[tokio::test]
async fn test_zero_links_captures_only_start_page() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(3)).build(), settings(dir.path()));

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 0))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 1);
    assert!(outcome.artifacts[0].file_name.ends_with("_screenshot_0.png"));
    assert_eq!(outcome.artifacts[0].source_url, START_URL);
    assert_eq!(count(&harness.counters().anchor_reads), 0);
}

#[tokio::test]
async fn test_invalid_url_is_rejected_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(3)).build(), settings(dir.path()));

    let err = harness
        .orchestrator
        .crawl(&CrawlRequest::new("not-a-url", 1))
        .await
        .unwrap_err();

    assert!(matches!(err, SnapError::Validation(_)));
    assert_eq!(count(&harness.counters().sessions_opened), 0);
    assert_eq!(harness.store.len(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn test_negative_link_count_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(3)).build(), settings(dir.path()));

    let err = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, -2))
        .await
        .unwrap_err();

    assert!(matches!(err, SnapError::Validation(_)));
    assert_eq!(count(&harness.counters().sessions_opened), 0);
}

#[tokio::test]
async fn test_unavailable_session_fails_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(
        FakeProvider::with_anchors(links(3)).unavailable().build(),
        settings(dir.path()),
    );

    let err = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, SnapError::SessionUnavailable { .. }));
    assert_eq!(harness.store.len(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn test_start_page_failure_persists_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let provider = FakeProvider::with_anchors(links(3)).failing(START_URL).build();
    let harness = Harness::new(provider, settings(dir.path()));

    let err = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 3))
        .await
        .unwrap_err();

    match err {
        SnapError::StartPage { url, .. } => assert_eq!(url, START_URL),
        other => panic!("expected start page failure, got {other:?}"),
    }

    let counters = harness.counters();
    assert_eq!(count(&counters.sessions_closed), 1);
    assert_eq!(count(&counters.pages_opened), 1);
    assert_eq!(count(&counters.pages_closed), 1);
    assert_eq!(harness.store.len(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn test_hung_page_times_out_without_stalling_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let provider = FakeProvider::with_anchors(links(3))
        .hanging("https://example.com/link2")
        .build();
    let harness = Harness::new(
        provider,
        CrawlSettings {
            page_timeout: Duration::from_millis(300),
            ..settings(dir.path())
        },
    );

    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        harness.orchestrator.crawl(&CrawlRequest::new(START_URL, 3)),
    )
    .await
    .expect("crawl should finish despite a hung page")
    .unwrap();

    assert_eq!(outcome.artifacts.len(), 4);
    assert_eq!(failure_kind(&outcome.artifacts[2].outcome), Some(FailureKind::Timeout));
    assert_eq!(outcome.failed_count(), 1);

    let counters = harness.counters();
    assert_eq!(count(&counters.pages_closed), count(&counters.pages_opened));
    assert_eq!(count(&counters.sessions_closed), 1);
}

#[tokio::test]
async fn test_panicking_capture_is_recorded_as_aborted() {
    let dir = tempfile::tempdir().unwrap();
    let provider = FakeProvider::with_anchors(links(2))
        .panicking("https://example.com/link1")
        .build();
    let harness = Harness::new(provider, settings(dir.path()));

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 2))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 3);
    assert_eq!(failure_kind(&outcome.artifacts[1].outcome), Some(FailureKind::Aborted));
    assert!(outcome.artifacts[2].is_success());
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = FakeProvider::with_anchors(links(6));
    for link in links(6) {
        builder = builder.delayed(&link, 50);
    }
    let harness = Harness::new(
        builder.build(),
        CrawlSettings {
            max_concurrent_captures: 2,
            ..settings(dir.path())
        },
    );

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 6))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 7);
    assert!(count(&harness.counters().max_open_pages) <= 2);
}

#[tokio::test]
async fn test_persistence_failure_carries_artifacts_and_skips_cache() {
    let dir = tempfile::tempdir().unwrap();
    let provider = FakeProvider::with_anchors(links(2)).build();
    let cache = Arc::new(MemoryResultCache::new(16, 60));
    let orchestrator = Orchestrator::new(
        Arc::new(provider.clone()),
        Arc::new(FailingStore),
        cache.clone(),
        settings(dir.path()),
    );

    let err = orchestrator
        .crawl(&CrawlRequest::new(START_URL, 2))
        .await
        .unwrap_err();

    match err {
        SnapError::Persistence { artifacts, .. } => {
            assert_eq!(artifacts.len(), 3);
            assert!(artifacts.iter().all(|a| a.is_success()));
        }
        other => panic!("expected persistence failure, got {other:?}"),
    }
    assert!(cache.is_empty());
    assert_eq!(count(&provider.counters.sessions_closed), 1);
}

#[tokio::test]
async fn test_lookup_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(3)).build(), settings(dir.path()));

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 3))
        .await
        .unwrap();

    let first = harness.lookup.lookup(&outcome.run_id).await.unwrap().unwrap();
    let second = harness.lookup.lookup(&outcome.run_id).await.unwrap().unwrap();

    assert_eq!(first, second);
    assert_eq!(first.source, LookupSource::Cache);
    assert_eq!(first.artifacts, outcome.artifacts);
}

#[tokio::test]
async fn test_lookup_falls_back_to_store_when_cache_is_cold() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(2)).build(), settings(dir.path()));

    let outcome = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 2))
        .await
        .unwrap();

    // A fresh process: same store, empty cache
    let cold = RunLookup::new(
        harness.store.clone(),
        Arc::new(MemoryResultCache::new(16, 60)),
    );
    let view = cold.lookup(&outcome.run_id).await.unwrap().unwrap();

    assert_eq!(view.source, LookupSource::Store);
    assert_eq!(view.artifacts, outcome.artifacts);
}

#[tokio::test]
async fn test_lookup_of_unknown_run_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(1)).build(), settings(dir.path()));

    let found = harness.lookup.lookup(&RunId::from("no-such-run")).await.unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn test_runs_do_not_share_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(2)).build(), settings(dir.path()));

    let first = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 2))
        .await
        .unwrap();
    let second = harness
        .orchestrator
        .crawl(&CrawlRequest::new(START_URL, 1))
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(harness.store.len(), 2);

    let first_view = harness.lookup.lookup(&first.run_id).await.unwrap().unwrap();
    let second_view = harness.lookup.lookup(&second.run_id).await.unwrap().unwrap();
    assert_eq!(first_view.artifacts.len(), 3);
    assert_eq!(second_view.artifacts.len(), 2);
}

fn page(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{href}">{href}</a>"#))
        .collect();
    format!("<html><head><title>Test</title></head><body>{anchors}</body></html>")
}

#[tokio::test]
async fn test_http_backend_end_to_end() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page(&["/page1", "/page2", "/missing", "/page3"]))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    for name in ["/page1", "/page2"] {
        Mock::given(method("GET"))
            .and(path(name))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<html><body>{name}</body></html>"))
                    .insert_header("content-type", "text/html"),
            )
            .mount(&mock_server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let artifact_dir = temp_dir.path().join("screenshots");
    let store = Arc::new(open_store(&temp_dir.path().join("db/runs.db")).unwrap());
    let cache = Arc::new(MemoryResultCache::new(16, 60));
    let provider = HttpSessionProvider::with_user_agent("snapcrawl-test/1.0", Duration::from_secs(5)).unwrap();

    let orchestrator = Orchestrator::new(
        Arc::new(provider),
        store.clone(),
        cache.clone(),
        CrawlSettings {
            artifact_dir: artifact_dir.clone(),
            page_timeout: Duration::from_secs(5),
            max_concurrent_captures: 4,
        },
    );

    let start_url = format!("{base_url}/");
    let outcome = orchestrator
        .crawl(&CrawlRequest::new(start_url.clone(), 3))
        .await
        .unwrap();

    assert_eq!(outcome.artifacts.len(), 4);
    assert_eq!(outcome.artifacts[0].source_url, start_url);
    assert_eq!(outcome.artifacts[1].source_url, format!("{base_url}/page1"));
    assert_eq!(outcome.artifacts[3].source_url, format!("{base_url}/missing"));
    assert_eq!(
        failure_kind(&outcome.artifacts[3].outcome),
        Some(FailureKind::Navigation)
    );

    // HTML snapshots were written for the successful captures
    for artifact in &outcome.artifacts[..3] {
        assert!(artifact.file_name.ends_with(".html"));
        let body = std::fs::read_to_string(artifact_dir.join(&artifact.file_name)).unwrap();
        assert!(body.contains("<html>"));
    }
    assert!(!artifact_dir.join(&outcome.artifacts[3].file_name).exists());

    // The store answers on its own once the cache is bypassed
    let lookup = RunLookup::new(store, Arc::new(MemoryResultCache::new(16, 60)));
    let view = lookup.lookup(&outcome.run_id).await.unwrap().unwrap();
    assert_eq!(view.source, LookupSource::Store);
    assert_eq!(view.artifacts, outcome.artifacts);

    let response = RunResponse::from(&view);
    assert_eq!(
        response.screenshots[1].url,
        format!("/static/screenshots/{}_screenshot_1.html", outcome.run_id)
    );
    assert_eq!(response.screenshots[3].status, "failed");
}

/// Configuration for the HTTP backend rooted in `dir`
fn http_config(dir: &Path, backend: &str) -> Config {
    parse_config(&format!(
        r#"
[renderer]
backend = "{backend}"
page-timeout-ms = 5000

[output]
database-path = "{}"
artifact-dir = "{}"
"#,
        dir.join("runs.db").display(),
        dir.join("screenshots").display()
    ))
    .unwrap()
}

#[tokio::test]
async fn test_serve_answers_lookup_from_cache_primed_by_crawl() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(FakeProvider::with_anchors(links(2)).build(), settings(dir.path()));

    let (mut requests, server_input) = tokio::io::duplex(4096);
    let (server_output, replies) = tokio::io::duplex(64 * 1024);
    let mut replies = BufReader::new(replies).lines();

    let client = async move {
        requests
            .write_all(
                b"{\"op\": \"crawl\", \"start_url\": \"https://example.com/\", \"number_of_links_to_follow\": 2}\n",
            )
            .await
            .unwrap();
        let crawl: serde_json::Value =
            serde_json::from_str(&replies.next_line().await.unwrap().unwrap()).unwrap();

        let run_id = crawl["run_id"].as_str().unwrap().to_string();
        requests
            .write_all(format!("{{\"op\": \"lookup\", \"run_id\": \"{run_id}\"}}\n").as_bytes())
            .await
            .unwrap();
        let lookup: serde_json::Value =
            serde_json::from_str(&replies.next_line().await.unwrap().unwrap()).unwrap();

        drop(requests);
        (crawl, lookup)
    };

    let (served, (crawl, lookup)) = tokio::join!(
        serve(
            &harness.orchestrator,
            &harness.lookup,
            BufReader::new(server_input),
            server_output
        ),
        client
    );

    assert_eq!(served.unwrap(), 2);
    assert_eq!(crawl["status"], "ok");
    assert_eq!(crawl["screenshots"].as_array().unwrap().len(), 3);
    assert_eq!(lookup["status"], "ok");
    assert_eq!(lookup["source"], "cache");
    assert_eq!(lookup["screenshots"], crawl["screenshots"]);
}

#[tokio::test]
async fn test_service_wiring_shares_cache_between_crawl_and_lookup() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(page(&[]))
                .insert_header("content-type", "text/html"),
        )
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let config = http_config(temp_dir.path(), "http");
    let (orchestrator, lookup) = build_service(&config).unwrap();

    let outcome = orchestrator
        .crawl(&CrawlRequest::new(format!("{}/", mock_server.uri()), 0))
        .await
        .unwrap();
    let view = lookup.lookup(&outcome.run_id).await.unwrap().unwrap();

    assert_eq!(view.source, LookupSource::Cache);
    assert_eq!(view.artifacts, outcome.artifacts);

    // A separate read side sees the same run through the store
    let cold = build_lookup(&config).unwrap();
    let stored = cold.lookup(&outcome.run_id).await.unwrap().unwrap();
    assert_eq!(stored.source, LookupSource::Store);
    assert_eq!(stored, view);
}

#[tokio::test]
async fn test_lookup_wiring_does_not_build_a_renderer() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config = http_config(temp_dir.path(), "chromium");

    let lookup = build_lookup(&config).unwrap();
    let found = lookup.lookup(&RunId::from("no-such-run")).await.unwrap();

    assert!(found.is_none());
}
