//! flow-api crate
//!
//! HTTP block service: `GET /block/{blockNumber}` returns a block's
//! transactions as JSON-encoded link records, served from an in-memory hot
//! cache, then the SQLite block cache, then the upstream RPC node.

pub mod error;
pub mod routes;
pub mod source;

pub use error::ApiError;
pub use routes::{build_router, serve, AppState};
pub use source::BlockSource;
