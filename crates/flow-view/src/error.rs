//! Errors raised at the viewer's fetch boundary.

use flow_graph::DecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success status; carries the service's `detail` or the status line.
    #[error("{0}")]
    Status(String),
    /// The response body was not a valid links document.
    #[error("invalid block data: {0}")]
    Decode(#[from] DecodeError),
}
