//! End-to-end tests for the HTTP search API.
//!
//! Each test starts the real axum server on a free port with an in-memory
//! catalog and deterministic embedder, then calls it with `reqwest`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use product_search::server::{serve, AppState};
use product_search_core::embedding::EmbeddingProvider;
use product_search_core::models::{Document, Hit};
use product_search_core::search::{SearchParams, TieredSearcher};
use product_search_core::store::memory::InMemoryStore;
use product_search_core::store::{CandidateStore, FieldMatch};

// ─── Test doubles ───────────────────────────────────────────────────

/// Maps every query to the same unit vector, optionally after a delay.
struct FixedEmbedder {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl FixedEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    fn model_name(&self) -> &str {
        "fixed"
    }
    fn dims(&self) -> usize {
        2
    }
    async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(vec![1.0, 0.0])
    }
}

/// Wraps an [`InMemoryStore`], counting calls and optionally failing.
struct CountingStore {
    inner: InMemoryStore,
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl CandidateStore for CountingStore {
    async fn search(
        &self,
        vector: &[f32],
        filter: Option<&FieldMatch>,
        limit: usize,
    ) -> Result<Vec<Hit>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            bail!("connection refused");
        }
        self.inner.search(vector, filter, limit).await
    }
}

/// Cosine scores against the query vector `[1, 0]`:
/// 2 (1.000), 6 (0.999), 1 (0.994), 4 (0.970), 7 (0.832), 3 (0.707), 5 (0.243).
fn catalog() -> InMemoryStore {
    let store = InMemoryStore::with_dims(2);
    let rows: [(&str, &str, [f32; 2]); 7] = [
        ("1", "Apple Juice", [0.9, 0.1]),
        ("2", "Apple Pie", [1.0, 0.0]),
        ("3", "Applesauce", [0.5, 0.5]),
        ("4", "Applewood Chips", [0.8, 0.2]),
        ("5", "Green apple candy", [0.2, 0.8]),
        ("6", "Pear Nectar", [0.95, 0.05]),
        ("7", "Pineapple Slices", [0.6, 0.4]),
    ];
    for (id, name, vector) in rows {
        store
            .insert(Document::new(id, name, Some(format!("{} description", name))), vector.to_vec())
            .unwrap();
    }
    store
}

struct TestServer {
    port: u16,
    embedder: Arc<FixedEmbedder>,
    store: Arc<CountingStore>,
    handle: tokio::task::JoinHandle<Result<()>>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(
    embedder: FixedEmbedder,
    inner: InMemoryStore,
    fail: bool,
    request_timeout: Duration,
) -> TestServer {
    let embedder = Arc::new(embedder);
    let store = Arc::new(CountingStore {
        inner,
        calls: AtomicUsize::new(0),
        fail,
    });
    let searcher = TieredSearcher::new(embedder.clone(), store.clone(), SearchParams::default());
    let state = AppState::new(searcher, request_timeout);

    let port = find_free_port();
    let bind = format!("127.0.0.1:{}", port);
    let handle = tokio::spawn(async move { serve(&bind, state).await });
    wait_for_server(port).await;

    TestServer {
        port,
        embedder,
        store,
        handle,
    }
}

async fn start_default() -> TestServer {
    start_server(FixedEmbedder::new(), catalog(), false, Duration::from_secs(5)).await
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn get_json(url: &str) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    let body: Value = resp.json().await.unwrap();
    (status, body)
}

fn result_ids(body: &Value) -> Vec<String> {
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["ID"].as_str().unwrap().to_string())
        .collect()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health() {
    let server = start_default().await;
    let (status, body) = get_json(&server.url("/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_search_orders_by_tier() {
    let server = start_default().await;
    let (status, body) = get_json(&server.url("/search?query=apple")).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], true);
    // exact [2, 1] → prefix [4, 3] → substring [7, 5] → rest [6]
    assert_eq!(result_ids(&body), vec!["2", "1", "4", "3", "7", "5", "6"]);

    let first = &body["results"][0];
    assert_eq!(first["Name"], "Apple Pie");
    assert_eq!(first["Description"], "Apple Pie description");
    assert!((first["score"].as_f64().unwrap() - 1.0).abs() < 1e-6);

    assert_eq!(server.embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(server.store.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_multi_word_query_narrows_substring_bucket() {
    let server = start_default().await;
    let (status, body) = get_json(&server.url("/search?query=Apple%20Juice!")).await;

    assert_eq!(status, 200);
    // "apple juice" is in no semantic candidate's name, so 6, 7, 5 rank by score.
    assert_eq!(result_ids(&body), vec!["2", "1", "4", "3", "6", "7", "5"]);
}

#[tokio::test]
async fn test_results_capped_and_unique() {
    let store = InMemoryStore::with_dims(2);
    for i in 0..15 {
        let x = 1.0 - i as f32 * 0.01;
        store
            .insert(Document::new(format!("{}", i), format!("Apple {}", i), None), vec![x, 0.1])
            .unwrap();
    }
    // The same product loaded twice, so the exact tier yields only 9 distinct IDs.
    store
        .insert(Document::new("0", "Apple 0", None), vec![1.0, 0.1])
        .unwrap();

    let server = start_server(FixedEmbedder::new(), store, false, Duration::from_secs(5)).await;
    let (status, body) = get_json(&server.url("/search?query=apple")).await;

    assert_eq!(status, 200);
    let ids = result_ids(&body);
    assert_eq!(ids.len(), 10);
    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), 10);

    let scores: Vec<f64> = body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["score"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    assert_eq!(ids, expected);
    assert_eq!(server.store.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_full_exact_tier_skips_later_tiers() {
    let store = InMemoryStore::with_dims(2);
    for i in 0..12 {
        store
            .insert(Document::new(format!("{}", i), "Apple", None), vec![1.0, i as f32 * 0.1])
            .unwrap();
    }
    let server = start_server(FixedEmbedder::new(), store, false, Duration::from_secs(5)).await;
    let (status, body) = get_json(&server.url("/search?query=apple")).await;

    assert_eq!(status, 200);
    assert_eq!(result_ids(&body).len(), 10);
    assert_eq!(server.store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_blank_query_rejected_without_collaborator_calls() {
    let server = start_default().await;

    for path in ["/search", "/search?query=", "/search?query=%20%20%09"] {
        let (status, body) = get_json(&server.url(path)).await;
        assert_eq!(status, 400, "path {}", path);
        assert_eq!(body["status"], false);
        assert_eq!(body["error"], "Query text is required");
        assert!(body.get("results").is_none());
    }

    assert_eq!(server.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(server.store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_store_failure_is_internal_error() {
    let server = start_server(FixedEmbedder::new(), catalog(), true, Duration::from_secs(5)).await;
    let (status, body) = get_json(&server.url("/search?query=apple")).await;

    assert_eq!(status, 500);
    assert_eq!(body["status"], false);
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("results").is_none());
    // Detail stays in the log.
    assert!(!body.to_string().contains("connection refused"));
}

#[tokio::test]
async fn test_deadline_expiry_is_internal_error() {
    let server = start_server(
        FixedEmbedder::slow(Duration::from_millis(500)),
        catalog(),
        false,
        Duration::from_millis(50),
    )
    .await;
    let (status, body) = get_json(&server.url("/search?query=apple")).await;

    assert_eq!(status, 500);
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("results").is_none());
    assert_eq!(server.store.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = start_default().await;
    let (status, body) = get_json(&server.url("/products/42")).await;

    assert_eq!(status, 404);
    assert_eq!(body["status"], false);
    assert_eq!(body["error"], "Endpoint not found");
}

#[tokio::test]
async fn test_cors_allows_browser_clients() {
    let server = start_default().await;
    let resp = reqwest::Client::new()
        .get(server.url("/search?query=pear"))
        .header("Origin", "http://shop.example")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}
