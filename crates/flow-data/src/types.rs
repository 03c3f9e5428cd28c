//! Type definitions for block data moving between the RPC node, the cache
//! and the block service.

use serde::{Deserialize, Serialize};

/// Block object as returned by `eth_getBlockByNumber(number, true)`.
///
/// Only the fields the viewer reads are mapped; everything else in the
/// payload is ignored on decode and preserved in the raw cache.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcBlock {
    /// Block number (hex quantity).
    pub number: Option<String>,
    /// Block hash (hex text).
    pub hash: Option<String>,
    /// Timestamp in unix seconds (hex quantity).
    pub timestamp: Option<String>,
    /// Full transaction objects.
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

/// Transaction object nested in [`RpcBlock`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcTransaction {
    /// Transaction hash (hex text).
    pub hash: Option<String>,
    /// Sender address (hex text).
    pub from: Option<String>,
    /// Recipient address (None for contract creation).
    pub to: Option<String>,
}

/// Row summary of a block held in the local cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CachedBlock {
    /// Block number.
    pub block_number: u64,
    /// Block hash (hex text, empty when the node omitted it).
    pub block_hash: String,
    /// Number of transactions in block.
    pub transaction_count: u64,
    /// RFC 3339 time the payload was stored.
    pub fetched_at: String,
}

/// Success body of `GET /block/{blockNumber}`.
///
/// `links` is itself a JSON document: an array of `{sender: recipient}`
/// objects, encoded as a string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinksResponse {
    pub status: String,
    pub links: String,
}

impl LinksResponse {
    pub fn success(links: String) -> Self {
        Self {
            status: "success".to_string(),
            links,
        }
    }
}

/// Error body of the block service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Parse an Ethereum hex quantity (`0x1a`) into a u64.
pub fn parse_quantity(value: &str) -> Option<u64> {
    let hex = value.strip_prefix("0x").unwrap_or(value);
    if hex.is_empty() {
        return None;
    }
    u64::from_str_radix(hex, 16).ok()
}
