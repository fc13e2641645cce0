//! Codec for Bayeux message batches.
//!
//! Bayeux messages travel as JSON arrays. A single bare object is accepted
//! on decode and treated as a batch of one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Maximum encoded batch size (1 MiB).
pub const MAX_BATCH_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Batch exceeds maximum size.
    #[error("Batch size {0} exceeds maximum {MAX_BATCH_SIZE}")]
    BatchTooLarge(usize),

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid channel name.
    #[error("Invalid channel: {0}")]
    InvalidChannel(&'static str),

    /// Unparseable protocol version.
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Payload is neither a message object nor an array of them.
    #[error("Invalid batch: {0}")]
    Invalid(String),
}

/// Encode messages as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization fails or the batch is too large.
pub fn encode_batch<T: Serialize>(messages: &[T]) -> Result<Vec<u8>, ProtocolError> {
    let data = serde_json::to_vec(messages)?;

    if data.len() > MAX_BATCH_SIZE {
        return Err(ProtocolError::BatchTooLarge(data.len()));
    }

    Ok(data)
}

/// Encode a single message as a batch of one.
///
/// # Errors
///
/// Returns an error if serialization fails or the batch is too large.
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    encode_batch(std::slice::from_ref(message))
}

/// Decode a batch of messages.
///
/// # Errors
///
/// Returns an error if the data is too large, is not JSON, or holds
/// something other than message objects.
pub fn decode_batch<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>, ProtocolError> {
    if data.len() > MAX_BATCH_SIZE {
        return Err(ProtocolError::BatchTooLarge(data.len()));
    }

    let value: Value = serde_json::from_slice(data)?;
    let items = match value {
        Value::Array(items) => items,
        object @ Value::Object(_) => vec![object],
        other => {
            return Err(ProtocolError::Invalid(format!(
                "expected object or array, got {}",
                json_kind(&other)
            )))
        }
    };

    items
        .into_iter()
        .map(|item| serde_json::from_value(item).map_err(ProtocolError::from))
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
