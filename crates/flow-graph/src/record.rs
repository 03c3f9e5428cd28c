//! Typed transaction records decoded from the block service's `links` field.
//!
//! On the wire a record is a loosely typed object mapping sender to
//! recipient. Decoding validates the shape once, here, so the builder only
//! ever sees `{ sender, recipients }`.

use serde_json::Value;
use thiserror::Error;

/// One sender and every recipient it paid within a single record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub sender: String,
    pub recipients: Vec<String>,
}

impl TransactionRecord {
    pub fn new(sender: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            sender: sender.into(),
            recipients,
        }
    }

    /// Record with a single recipient.
    pub fn single(sender: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self::new(sender, vec![recipient.into()])
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("links payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("links payload must be a JSON array of transaction records")]
    NotAnArray,
    #[error("transaction record {index} is not an object")]
    InvalidRecord { index: usize },
    #[error("transaction record {index} has a non-address recipient for sender {sender}")]
    InvalidRecipient { index: usize, sender: String },
    #[error("response body has no string `links` field")]
    MissingLinks,
}

/// Decode the JSON-encoded `links` string into typed records.
///
/// Every key of a record object is a sender. Its value is a recipient
/// string, an array of recipient strings, or `null` (contract creation,
/// which contributes the sender alone). Records keep their wire order and
/// senders keep their key order.
pub fn decode_links(links: &str) -> Result<Vec<TransactionRecord>, DecodeError> {
    let value: Value = serde_json::from_str(links)?;
    let Value::Array(items) = value else {
        return Err(DecodeError::NotAnArray);
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(entries) = item else {
            return Err(DecodeError::InvalidRecord { index });
        };

        for (sender, recipient) in entries {
            let recipients = match recipient {
                Value::String(to) => vec![to],
                Value::Null => Vec::new(),
                Value::Array(values) => values
                    .into_iter()
                    .map(|v| match v {
                        Value::String(to) => Some(to),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| DecodeError::InvalidRecipient {
                        index,
                        sender: sender.clone(),
                    })?,
                _ => return Err(DecodeError::InvalidRecipient { index, sender }),
            };
            records.push(TransactionRecord { sender, recipients });
        }
    }
    Ok(records)
}

/// Decode a whole `{ "links": "<json>" }` response body.
pub fn decode_response(body: &str) -> Result<Vec<TransactionRecord>, DecodeError> {
    let value: Value = serde_json::from_str(body)?;
    let links = value
        .get("links")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingLinks)?;
    decode_links(links)
}
