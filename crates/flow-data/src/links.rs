//! Transaction filter: reduce a full block to sender→recipient link records.
//!
//! Each transaction becomes a one-key object `{from: to}`. Contract
//! creations keep a `null` recipient. The resulting array is JSON-encoded
//! into the `links` string of the block service response.

use eyre::{Context, Result};
use serde_json::{Map, Value};

use crate::types::{LinksResponse, RpcBlock};

/// Map a block's transactions to `{from: to}` records, preserving order.
///
/// Transactions without a sender are skipped.
///
/// # Errors
/// Returns error if the payload does not have the shape of a block.
pub fn filter_transactions(payload: &Value) -> Result<Vec<Map<String, Value>>> {
    let block: RpcBlock = serde_json::from_value(payload.clone())
        .wrap_err("block payload does not match eth_getBlockByNumber shape")?;

    let mut records = Vec::with_capacity(block.transactions.len());
    for tx in block.transactions {
        let Some(from) = tx.from else {
            tracing::debug!(tx_hash = ?tx.hash, "skipping transaction without sender");
            continue;
        };
        let mut record = Map::with_capacity(1);
        record.insert(from, tx.to.map(Value::String).unwrap_or(Value::Null));
        records.push(record);
    }
    Ok(records)
}

/// Encode link records as the JSON string carried in [`LinksResponse::links`].
pub fn encode_links(records: &[Map<String, Value>]) -> Result<String> {
    serde_json::to_string(records).wrap_err("failed to encode link records")
}

/// Build the block service response for a raw block payload.
pub fn links_response(payload: &Value) -> Result<LinksResponse> {
    let records = filter_transactions(payload)?;
    Ok(LinksResponse::success(encode_links(&records)?))
}
