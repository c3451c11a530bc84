//! Dotted-path extraction from JSON documents.
//!
//! `"respData.contents"` walks `respData` then `contents`. Every segment before
//! the last must land on an object; the last one may hold any JSON value.
//! Failures report the path consumed so far, including the failing segment.

use bytes::Bytes;
use serde_json::Value;

use crate::error::NetworkError;

/// Extract the value at `path` from the JSON document in `body` and return it
/// re-serialized.
pub fn extract(body: &[u8], path: &str) -> Result<Bytes, NetworkError> {
    let document: Value = serde_json::from_slice(body).map_err(NetworkError::Decode)?;
    let value = extract_value(&document, path)?;
    let bytes = serde_json::to_vec(value).map_err(|e| NetworkError::Encode(e.to_string()))?;
    Ok(Bytes::from(bytes))
}

/// Walk `document` along the dotted `path`.
pub fn extract_value<'a>(document: &'a Value, path: &str) -> Result<&'a Value, NetworkError> {
    let mut consumed = String::with_capacity(path.len());
    let mut current = document;
    for segment in path.split('.') {
        if !consumed.is_empty() {
            consumed.push('.');
        }
        consumed.push_str(segment);

        if segment.trim().is_empty() {
            return Err(lookup_failed(consumed));
        }
        let Value::Object(map) = current else {
            return Err(lookup_failed(consumed));
        };
        match map.get(segment) {
            Some(next) => current = next,
            None => return Err(lookup_failed(consumed)),
        }
    }
    Ok(current)
}

fn lookup_failed(partial_path: String) -> NetworkError {
    NetworkError::PathExtraction { partial_path }
}
