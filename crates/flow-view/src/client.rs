//! HTTP client for the block service.

use futures::future::BoxFuture;
use reqwest::StatusCode;

use flow_data::ErrorBody;
use flow_graph::{decode_response, TransactionRecord};

use crate::error::ViewError;

/// Where the block service listens by default.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Anything that can produce a block's decoded transaction records.
pub trait RecordSource: Send + Sync {
    fn records(&self, block_number: u64) -> BoxFuture<'_, Result<Vec<TransactionRecord>, ViewError>>;
}

#[derive(Clone, Debug)]
pub struct BlockApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl BlockApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn block_url(&self, block_number: u64) -> String {
        format!("{}/block/{}", self.base_url, block_number)
    }

    /// `GET /block/{n}` and decode the links document.
    ///
    /// No timeout is applied: a hung service keeps the request pending until
    /// a newer request cancels it.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_records(
        &self,
        block_number: u64,
    ) -> Result<Vec<TransactionRecord>, ViewError> {
        let response = self.client.get(self.block_url(block_number)).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ViewError::Status(error_message(status, &body)));
        }

        let records = decode_response(&body)?;
        tracing::debug!(records = records.len(), "block links decoded");
        Ok(records)
    }
}

impl Default for BlockApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl RecordSource for BlockApiClient {
    fn records(&self, block_number: u64) -> BoxFuture<'_, Result<Vec<TransactionRecord>, ViewError>> {
        Box::pin(self.fetch_records(block_number))
    }
}

/// The service's `detail` when the body carries one, else the status line.
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|err| err.detail)
        .unwrap_or_else(|_| status_line(status))
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
