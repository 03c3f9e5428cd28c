//! Integration tests for the block service endpoints.
//!
//! The upstream node is replaced by an in-memory fixture that counts calls,
//! so cache behaviour can be observed without a network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum_test::TestServer;
use flow_api::{build_router, AppState, BlockSource};
use flow_data::store::Store;
use futures::future::BoxFuture;
use serde_json::{json, Value};

struct FixtureSource {
    blocks: HashMap<u64, Value>,
    fail: bool,
    calls: AtomicUsize,
}

impl FixtureSource {
    fn new(blocks: HashMap<u64, Value>) -> Self {
        Self {
            blocks,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(HashMap::new())
        }
    }
}

impl BlockSource for FixtureSource {
    fn block(&self, block_number: u64) -> BoxFuture<'_, eyre::Result<Option<Value>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail {
            Err(eyre::eyre!("connection refused"))
        } else {
            Ok(self.blocks.get(&block_number).cloned())
        };
        Box::pin(async move { result })
    }
}

fn sample_block() -> Value {
    json!({
        "number": "0x125dc59",
        "hash": "0xfeed",
        "transactions": [
            { "hash": "0x01", "from": "0xA", "to": "0xB" },
            { "hash": "0x02", "from": "0xB", "to": "0xC" },
            { "hash": "0x03", "from": "0xD", "to": null }
        ]
    })
}

fn server_with(source: Arc<FixtureSource>) -> (TestServer, Arc<Store>) {
    let store = Arc::new(Store::new(":memory:").expect("in-memory store should always open"));
    let app = build_router(AppState::new(store.clone(), source));
    (TestServer::new(app).expect("Failed to create test server"), store)
}

#[tokio::test]
async fn block_returns_encoded_links() {
    let source = Arc::new(FixtureSource::new(HashMap::from([(19_258_457, sample_block())])));
    let (server, store) = server_with(source.clone());

    let response = server.get("/block/19258457").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(
        body["links"],
        r#"[{"0xA":"0xB"},{"0xB":"0xC"},{"0xD":null}]"#
    );

    // fetched payload lands in the block cache
    assert!(store.get_block(19_258_457).unwrap().is_some());
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_requests_do_not_hit_upstream() {
    let source = Arc::new(FixtureSource::new(HashMap::from([(7, sample_block())])));
    let (server, _store) = server_with(source.clone());

    let first: Value = server.get("/block/7").await.json();
    let second: Value = server.get("/block/7").await.json();

    assert_eq!(first, second);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cached_block_is_served_without_upstream() {
    let source = Arc::new(FixtureSource::failing());
    let (server, store) = server_with(source.clone());
    store.insert_block(42, &sample_block()).unwrap();

    let response = server.get("/block/42").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_block_is_404_with_detail() {
    let source = Arc::new(FixtureSource::new(HashMap::new()));
    let (server, _store) = server_with(source);

    let response = server.get("/block/99").await;
    assert_eq!(response.status_code(), 404);
    let body: Value = response.json();
    assert_eq!(body["detail"], "block 99 not found");
}

#[tokio::test]
async fn upstream_failure_is_500_with_detail() {
    let (server, store) = server_with(Arc::new(FixtureSource::failing()));

    let response = server.get("/block/5").await;
    assert_eq!(response.status_code(), 500);
    let body: Value = response.json();
    assert!(body["detail"]
        .as_str()
        .is_some_and(|d| d.contains("connection refused")));
    assert!(store.get_block(5).unwrap().is_none());
}

#[tokio::test]
async fn non_numeric_block_is_400() {
    let (server, _store) = server_with(Arc::new(FixtureSource::new(HashMap::new())));

    let response = server.get("/block/latest").await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["detail"], "invalid block number: latest");
}

#[tokio::test]
async fn health_and_cors() {
    let (server, _store) = server_with(Arc::new(FixtureSource::new(HashMap::new())));

    let response = server
        .get("/health")
        .add_header(header::ORIGIN, HeaderValue::from_static("http://localhost:5500"))
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.json::<Value>()["status"], "ok");
    assert_eq!(
        response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        HeaderValue::from_static("*")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_share_the_store() {
    let blocks: HashMap<u64, Value> = (1..=8).map(|n| (n, sample_block())).collect();
    let source = Arc::new(FixtureSource::new(blocks));
    let (server, store) = server_with(source.clone());

    let responses = futures::future::join_all((1..=8).map(|n| {
        let request = server.get(&format!("/block/{n}"));
        async move { request.await }
    }))
    .await;

    assert!(responses.iter().all(|r| r.status_code() == 200));
    assert_eq!(store.cached_blocks().unwrap().len(), 8);
    assert_eq!(source.calls.load(Ordering::SeqCst), 8);
}
