//! JSON-RPC client for fetching full blocks from an Ethereum node.
//!
//! Blocks are requested with `eth_getBlockByNumber(hex, true)` so the
//! transaction objects (with `from`/`to`) come back inline.

use std::sync::Arc;
use std::time::Duration;

use eyre::{eyre, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::store::{payload_block_number, Store};
use crate::types::parse_quantity;

/// Concurrent RPC calls allowed during a range fetch.
const MAX_CONCURRENT_FETCHES: usize = 10;
/// Attempts per block before a range fetch gives up on it.
const FETCH_ATTEMPTS: u32 = 3;

/// Fetches blocks over HTTP JSON-RPC.
#[derive(Clone)]
pub struct RpcClient {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl RpcClient {
    /// Creates a client without contacting the node.
    ///
    /// # Errors
    /// Returns error if `rpc_url` is not a valid http(s) URL.
    pub fn new(rpc_url: &str) -> Result<Self> {
        let url = reqwest::Url::parse(rpc_url).wrap_err("invalid RPC URL format")?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(eyre!("unsupported RPC URL scheme: {}", url.scheme()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }

    /// Creates a client and tests RPC connectivity.
    ///
    /// Verifies connection via `eth_blockNumber` call and logs the RPC endpoint.
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the connectivity test fails.
    #[tracing::instrument(skip_all, fields(rpc_url = %rpc_url))]
    pub async fn connect(rpc_url: &str) -> Result<Self> {
        let client = Self::new(rpc_url)?;
        let latest_block = client
            .block_number()
            .await
            .wrap_err("failed to test RPC connectivity with eth_blockNumber")?;

        tracing::info!(latest_block, "RPC connection successful");
        Ok(client)
    }

    /// Make a single JSON-RPC call and return the `result` field.
    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .wrap_err_with(|| format!("{method} request failed"))?
            .error_for_status()
            .wrap_err_with(|| format!("{method} returned an error status"))?;

        let mut payload: Value = response
            .json()
            .await
            .wrap_err_with(|| format!("{method} response is not JSON"))?;

        if let Some(err) = payload.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown RPC error");
            return Err(eyre!("RPC error from {method}: {message}"));
        }

        Ok(payload
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    /// Latest block number known to the node.
    pub async fn block_number(&self) -> Result<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        result
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| eyre!("eth_blockNumber returned a non-quantity: {result}"))
    }

    /// Fetches a full block with transaction objects.
    ///
    /// Returns `Ok(None)` if the node does not know the block.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_block(&self, block_number: u64) -> Result<Option<Value>> {
        let result = self
            .call(
                "eth_getBlockByNumber",
                json!([format!("0x{block_number:x}"), true]),
            )
            .await
            .wrap_err_with(|| format!("failed to fetch block {block_number}"))?;

        if result.is_null() {
            tracing::debug!("block not found");
            return Ok(None);
        }

        if let Some(reported) = payload_block_number(&result) {
            if reported != block_number {
                return Err(eyre!(
                    "node returned block {reported} when asked for {block_number}"
                ));
            }
        }

        Ok(Some(result))
    }

    /// Fetches a range of blocks into the store with rate limiting and retries.
    ///
    /// - Skips blocks already cached
    /// - Limits to 10 concurrent RPC calls via `tokio::sync::Semaphore`
    /// - Retries failed blocks up to 3 times with 500ms exponential backoff
    /// - Logs warnings for missing or failing blocks but continues
    ///
    /// Returns the number of blocks newly stored.
    ///
    /// # Errors
    /// Returns error if database operations fail.
    #[tracing::instrument(skip(self, store))]
    pub async fn fetch_range(&self, start: u64, end: u64, store: &Store) -> Result<usize> {
        let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_FETCHES));
        let multi = MultiProgress::new();
        let block_pb = multi.add(ProgressBar::new(end.saturating_sub(start) + 1));
        block_pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} blocks")
                .wrap_err("invalid progress bar template")?,
        );

        let mut to_fetch = Vec::new();
        for block_num in start..=end {
            if store.block_range_exists(block_num, block_num)? {
                block_pb.inc(1);
            } else {
                to_fetch.push(block_num);
            }
        }

        tracing::info!(
            total_blocks = end.saturating_sub(start) + 1,
            blocks_to_fetch = to_fetch.len(),
            "starting block range fetch"
        );

        let handles: Vec<_> = to_fetch
            .into_iter()
            .map(|block_num| {
                let sem = semaphore.clone();
                let client = self.clone();
                tokio::spawn(async move {
                    let _permit = sem.acquire().await.ok();
                    let mut attempt = 0;
                    loop {
                        match client.fetch_block(block_num).await {
                            Ok(result) => return (block_num, Ok(result)),
                            Err(e) if attempt + 1 < FETCH_ATTEMPTS => {
                                let backoff_ms = 500 * 2_u64.pow(attempt);
                                tracing::debug!(
                                    block_number = block_num,
                                    attempt = attempt + 1,
                                    backoff_ms,
                                    error = %e,
                                    "retrying failed block fetch"
                                );
                                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                                attempt += 1;
                            }
                            Err(e) => return (block_num, Err(e)),
                        }
                    }
                })
            })
            .collect();

        let mut stored = 0;
        for joined in futures::future::join_all(handles).await {
            let (block_num, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("task join error: {}", e);
                    continue;
                }
            };

            match result {
                Ok(Some(payload)) => {
                    store.insert_block(block_num, &payload)?;
                    stored += 1;
                }
                Ok(None) => {
                    tracing::warn!(block_number = block_num, "block not found in RPC");
                }
                Err(e) => {
                    tracing::error!(
                        block_number = block_num,
                        "failed to fetch block after {} attempts: {:#}",
                        FETCH_ATTEMPTS,
                        e
                    );
                }
            }
            block_pb.inc(1);
        }

        block_pb.finish_with_message("fetched all blocks");
        Ok(stored)
    }
}
