//! flow-data crate
//!
//! Block acquisition and storage: JSON-RPC fetching, the SQLite block cache,
//! and the transaction filter that turns a block into link records.

pub mod links;
pub mod rpc;
pub mod store;
pub mod types;

pub use types::{CachedBlock, ErrorBody, LinksResponse, RpcBlock, RpcTransaction};
