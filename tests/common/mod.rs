//! Shared test helpers and utilities.
//!
//! Factories for block payloads and records, an in-memory upstream node,
//! a canvas that keeps every frame, and a block service bound to an
//! ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use flow_api::{build_router, AppState, BlockSource};
use flow_data::store::Store;
use flow_graph::TransactionRecord;
use flow_view::Canvas;
use futures::future::BoxFuture;
use serde_json::{json, Value};

/// Creates an in-memory SQLite Store with all migrations applied.
///
/// # Panics
/// Panics if the in-memory database cannot be created (should never happen).
pub fn test_store() -> Arc<Store> {
    Arc::new(Store::new(":memory:").expect("in-memory store should always open"))
}

/// Creates an `eth_getBlockByNumber` payload with the given `(from, to)`
/// transactions. A `None` recipient is a contract creation.
pub fn sample_block(number: u64, txs: &[(&str, Option<&str>)]) -> Value {
    let transactions: Vec<Value> = txs
        .iter()
        .enumerate()
        .map(|(i, (from, to))| {
            json!({
                "hash": format!("0x{:064x}", number * 1_000 + i as u64),
                "from": from,
                "to": to,
            })
        })
        .collect();

    json!({
        "number": format!("0x{number:x}"),
        "hash": format!("0x{:064x}", number),
        "timestamp": format!("0x{:x}", 1_708_617_600 + number * 12),
        "transactions": transactions,
    })
}

/// Records `[{"0xA":"0xB"}, {"0xB":"0xC"}]`.
pub fn two_hop_records() -> Vec<TransactionRecord> {
    vec![
        TransactionRecord::single("0xA", "0xB"),
        TransactionRecord::single("0xB", "0xC"),
    ]
}

/// Upstream node serving fixed payloads and counting calls.
pub struct FixtureSource {
    blocks: HashMap<u64, Value>,
    calls: AtomicUsize,
}

impl FixtureSource {
    pub fn new(blocks: impl IntoIterator<Item = (u64, Value)>) -> Self {
        Self {
            blocks: blocks.into_iter().collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BlockSource for FixtureSource {
    fn block(&self, block_number: u64) -> BoxFuture<'_, eyre::Result<Option<Value>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let block = self.blocks.get(&block_number).cloned();
        Box::pin(async move { Ok(block) })
    }
}

/// Canvas that keeps every presented frame.
#[derive(Clone, Default)]
pub struct RecordingCanvas {
    frames: Arc<Mutex<Vec<String>>>,
}

impl RecordingCanvas {
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().expect("frames lock").clone()
    }

    pub fn last(&self) -> Option<String> {
        self.frames().pop()
    }
}

impl Canvas for RecordingCanvas {
    fn present(&mut self, svg: &str) -> eyre::Result<()> {
        self.frames
            .lock()
            .map_err(|_| eyre::eyre!("frames lock poisoned"))?
            .push(svg.to_string());
        Ok(())
    }
}

/// Serves the block service on `127.0.0.1:0` and returns its base URL.
pub async fn spawn_service(source: Arc<FixtureSource>) -> (String, Arc<Store>) {
    let store = test_store();
    let router = build_router(AppState::new(store.clone(), source));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port should bind");
    let addr = listener.local_addr().expect("listener has an address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("block service should run");
    });

    (format!("http://{addr}"), store)
}
