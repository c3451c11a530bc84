//! HTTP data types shared by the engine and the transport.
//!
//! # Design
//! These types describe what crosses the transport boundary as plain data.
//! The engine resolves a descriptor into a `TransportRequest`, hands it to the
//! transport, and gets a `TransportResponse` back. Nothing here performs I/O.
//!
//! All fields use owned types so values can move freely between the thread
//! that issues a request and the one that completes it.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use serde::Serialize;

/// Header bag. Keys are unique; inserting an existing key overwrites it.
pub type Headers = BTreeMap<String, String>;

/// Parameter bag sent with a request.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Connect => "CONNECT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Whether parameters for this method travel in the request body rather
    /// than the query string.
    pub fn encodes_in_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common request headers in typed form.
///
/// Only the fields that are set show up in [`Header::headers`], under their
/// wire names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Header {
    #[serde(rename = "Accept", skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    #[serde(rename = "Accept-Charset", skip_serializing_if = "Option::is_none")]
    pub accept_charset: Option<String>,
    #[serde(rename = "Accept-Language", skip_serializing_if = "Option::is_none")]
    pub accept_language: Option<String>,
    #[serde(rename = "Accept-Encoding", skip_serializing_if = "Option::is_none")]
    pub accept_encoding: Option<String>,
    /// `Bearer <token>` or `Basic <base64 user:password>`.
    #[serde(rename = "Authorization", skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,
    #[serde(rename = "Content-Disposition", skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    #[serde(rename = "Content-Type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(rename = "User-Agent", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Header {
    /// The set fields as a header bag.
    pub fn headers(&self) -> Headers {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .filter_map(|(name, value)| match value {
                    serde_json::Value::String(value) => Some((name, value)),
                    _ => None,
                })
                .collect(),
            _ => Headers::new(),
        }
    }
}

/// A fully resolved request as handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub url: String,
    pub method: HttpMethod,
    pub parameters: Parameters,
    pub headers: Headers,
    pub timeout: Duration,
}

/// Timing of one transport round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metrics {
    pub started_at: SystemTime,
    pub duration: Duration,
}

impl Metrics {
    pub fn new(started_at: SystemTime, duration: Duration) -> Self {
        Self {
            started_at,
            duration,
        }
    }
}

/// What the transport returns for a completed round-trip.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
    pub request: TransportRequest,
    pub metrics: Metrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_are_uppercase() {
        assert_eq!(HttpMethod::Get.as_str(), "GET");
        assert_eq!(HttpMethod::Options.to_string(), "OPTIONS");
        assert_eq!(HttpMethod::Trace.to_string(), "TRACE");
    }

    #[test]
    fn only_post_put_patch_encode_in_body() {
        assert!(HttpMethod::Post.encodes_in_body());
        assert!(HttpMethod::Put.encodes_in_body());
        assert!(HttpMethod::Patch.encodes_in_body());
        assert!(!HttpMethod::Get.encodes_in_body());
        assert!(!HttpMethod::Delete.encodes_in_body());
        assert!(!HttpMethod::Head.encodes_in_body());
    }

    #[test]
    fn empty_header_yields_empty_bag() {
        assert!(Header::default().headers().is_empty());
    }

    #[test]
    fn header_uses_wire_names() {
        let header = Header {
            accept: Some("application/json".to_string()),
            authorization: Some("Bearer abc".to_string()),
            ..Header::default()
        };
        let bag = header.headers();
        assert_eq!(bag.len(), 2);
        assert_eq!(bag["Accept"], "application/json");
        assert_eq!(bag["Authorization"], "Bearer abc");
    }
}
