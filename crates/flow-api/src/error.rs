//! Service errors and their `{ "detail": ... }` response bodies.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flow_data::ErrorBody;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid block number: {0}")]
    InvalidBlockNumber(String),
    #[error("block {0} not found")]
    NotFound(u64),
    #[error("{0:#}")]
    Upstream(eyre::Report),
    #[error("{0:#}")]
    Store(eyre::Report),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidBlockNumber(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = %status, "{}", self);
        } else {
            tracing::debug!(status = %status, "{}", self);
        }
        (status, Json(ErrorBody { detail: self.to_string() })).into_response()
    }
}
