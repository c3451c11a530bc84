//! Error types for the request pipeline.
//!
//! # Design
//! Every failure a request can run into ends up in one `NetworkError`, and
//! every `NetworkError` is delivered to the caller's completion callback.
//! Transport failures keep their original error as `source()` so callers can
//! downcast when they need the underlying client's detail.

use std::time::Duration;

use thiserror::Error;

/// Errors delivered to request completion callbacks.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NetworkError {
    /// The descriptor rejected itself before any I/O happened.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The descriptor's fields could not be encoded as request parameters.
    #[error("failed to encode request fields: {0}")]
    Encode(String),

    /// A response body (or an extracted part of it) was not the expected JSON.
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The result key did not resolve. `partial_path` holds the segments
    /// consumed up to and including the one that failed.
    #[error("result key lookup failed at '{partial_path}'")]
    PathExtraction { partial_path: String },

    /// Network-level failure reported by the transport.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The transport gave up after the request's timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The transport flagged a non-2xx status.
    #[error("HTTP {status}: {body_preview}")]
    HttpStatus { status: u16, body_preview: String },

    /// The operation was cancelled at the transport layer.
    #[error("request cancelled")]
    Cancelled,

    /// A handler deliberately failed the request.
    #[error("rejected by handler: {0}")]
    Handler(String),
}

impl NetworkError {
    /// Wrap any error as an opaque transport failure.
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        NetworkError::Transport(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl Error for TestError {}

    #[test]
    fn transport_error_preserves_source() {
        let err = NetworkError::transport(TestError("connection refused"));
        let source = err.source().expect("transport error should have a source");
        let inner = source.downcast_ref::<TestError>().unwrap();
        assert_eq!(inner.0, "connection refused");
        assert_eq!(err.to_string(), "transport error: connection refused");
    }

    #[test]
    fn path_extraction_names_partial_path() {
        let err = NetworkError::PathExtraction {
            partial_path: "respData.contents".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "result key lookup failed at 'respData.contents'"
        );
    }

    #[test]
    fn decode_error_keeps_serde_source() {
        let serde_err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err = NetworkError::Decode(serde_err);
        assert!(err.source().unwrap().is::<serde_json::Error>());
    }

    #[test]
    fn http_status_display() {
        let err = NetworkError::HttpStatus {
            status: 503,
            body_preview: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: unavailable");
    }
}
