//! The transport boundary and a blocking `ureq` implementation of it.
//!
//! # Design
//! The engine never performs I/O itself. It hands a [`TransportRequest`] and a
//! completion to a [`Transport`], which must call the completion exactly once,
//! from any thread, and return a handle that can cancel the operation.
//!
//! [`UreqTransport`] runs each request on its own thread. A blocking socket
//! cannot be interrupted, so cancelling marks the operation instead: when it
//! finishes, its completion reports [`NetworkError::Cancelled`] and the real
//! outcome is discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::RequestBuilder;

use crate::error::NetworkError;
use crate::http::{Headers, HttpMethod, Metrics, Parameters, TransportRequest, TransportResponse};

/// Default User-Agent sent by [`UreqTransport`].
pub const DEFAULT_USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

pub type TransportResult = Result<TransportResponse, NetworkError>;

/// Called once with the outcome of a transport operation.
pub type TransportCompletion = Box<dyn FnOnce(TransportResult) + Send + 'static>;

/// Cancels one in-flight transport operation.
pub trait TransportHandle: Send + Sync {
    fn cancel(&self);
}

/// Performs the network I/O for the engine.
pub trait Transport: Send + Sync {
    /// Start `request`. `completion` is called exactly once when it finishes,
    /// fails, or is cancelled.
    fn send(&self, request: TransportRequest, completion: TransportCompletion) -> Box<dyn TransportHandle>;

    /// Cancel every operation still in flight.
    fn cancel_all(&self);
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Treat statuses outside 200..300 as [`NetworkError::HttpStatus`] failures.
    pub validate_status: bool,
    /// Sent unless the request carries its own `User-Agent`.
    pub user_agent: String,
    /// Bytes of an error body kept in `HttpStatus::body_preview`.
    pub body_preview_limit: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            validate_status: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            body_preview_limit: 256,
        }
    }
}

/// Flatten parameters into string pairs for a query string or form body.
///
/// Strings go out verbatim, `null` as an empty value, everything else as
/// compact JSON text.
pub fn encode_parameters(parameters: &Parameters) -> Vec<(String, String)> {
    parameters
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

struct CancelFlag(Arc<AtomicBool>);

impl TransportHandle for CancelFlag {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Thread-per-request transport backed by `ureq`.
#[derive(Debug, Default)]
pub struct UreqTransport {
    config: TransportConfig,
    in_flight: Arc<Mutex<HashMap<u64, Arc<AtomicBool>>>>,
    next_id: AtomicU64,
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            in_flight: Arc::default(),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: TransportRequest, completion: TransportCompletion) -> Box<dyn TransportHandle> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        self.in_flight.lock().insert(id, Arc::clone(&cancelled));

        let slot = Arc::new(Mutex::new(Some(completion)));
        let worker_slot = Arc::clone(&slot);
        let in_flight = Arc::clone(&self.in_flight);
        let flag = Arc::clone(&cancelled);
        let config = self.config.clone();

        let spawned = thread::Builder::new()
            .name("courier-transport".to_string())
            .spawn(move || {
                let outcome = perform(&config, request);
                in_flight.lock().remove(&id);
                let outcome = if flag.load(Ordering::SeqCst) {
                    Err(NetworkError::Cancelled)
                } else {
                    outcome
                };
                let completion = worker_slot.lock().take();
                if let Some(completion) = completion {
                    completion(outcome);
                }
            });

        if let Err(err) = spawned {
            tracing::warn!(error = %err, "failed to spawn transport thread");
            self.in_flight.lock().remove(&id);
            let completion = slot.lock().take();
            if let Some(completion) = completion {
                completion(Err(NetworkError::transport(err)));
            }
        }
        Box::new(CancelFlag(cancelled))
    }

    fn cancel_all(&self) {
        let in_flight = self.in_flight.lock();
        tracing::debug!(count = in_flight.len(), "cancelling all transport operations");
        for flag in in_flight.values() {
            flag.store(true, Ordering::SeqCst);
        }
    }
}

fn perform(config: &TransportConfig, request: TransportRequest) -> TransportResult {
    let started_at = SystemTime::now();
    let clock = Instant::now();
    let timeout = request.timeout;

    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .build()
        .new_agent();

    let mut headers = request.headers.clone();
    if !headers.keys().any(|name| name.eq_ignore_ascii_case("user-agent")) {
        headers.insert("User-Agent".to_string(), config.user_agent.clone());
    }
    let pairs = encode_parameters(&request.parameters);
    let url = request.url.as_str();

    let sent = match request.method {
        HttpMethod::Post => send_with_body(agent.post(url), &headers, &pairs),
        HttpMethod::Put => send_with_body(agent.put(url), &headers, &pairs),
        HttpMethod::Patch => send_with_body(agent.patch(url), &headers, &pairs),
        HttpMethod::Get => send_without_body(agent.get(url), &headers, &pairs),
        HttpMethod::Delete => send_without_body(agent.delete(url), &headers, &pairs),
        HttpMethod::Head => send_without_body(agent.head(url), &headers, &pairs),
        HttpMethod::Options => send_without_body(agent.options(url), &headers, &pairs),
        HttpMethod::Connect => send_without_body(agent.connect(url), &headers, &pairs),
        HttpMethod::Trace => send_without_body(agent.trace(url), &headers, &pairs),
    };
    let mut response = sent.map_err(|e| map_error(e, timeout))?;

    let status = response.status().as_u16();
    let response_headers: Headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| map_error(e, timeout))?;

    if config.validate_status && !(200..300).contains(&status) {
        let end = body.len().min(config.body_preview_limit);
        return Err(NetworkError::HttpStatus {
            status,
            body_preview: String::from_utf8_lossy(&body[..end]).into_owned(),
        });
    }

    Ok(TransportResponse {
        status,
        headers: response_headers,
        body: Bytes::from(body),
        request,
        metrics: Metrics::new(started_at, clock.elapsed()),
    })
}

fn send_without_body(
    mut builder: RequestBuilder<WithoutBody>,
    headers: &Headers,
    pairs: &[(String, String)],
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    for (key, value) in pairs {
        builder = builder.query(key, value);
    }
    builder.call()
}

fn send_with_body(
    mut builder: RequestBuilder<WithBody>,
    headers: &Headers,
    pairs: &[(String, String)],
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if pairs.is_empty() {
        builder.send_empty()
    } else {
        builder.send_form(pairs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
    }
}

fn map_error(err: ureq::Error, timeout: Duration) -> NetworkError {
    match err {
        ureq::Error::Timeout(_) => NetworkError::Timeout(timeout),
        other => NetworkError::transport(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parameters_flatten_to_strings() {
        let Value::Object(params) = json!({
            "id": "100",
            "count": 3,
            "active": true,
            "missing": null,
            "contents": { "id": "112" }
        }) else {
            unreachable!()
        };
        let pairs: HashMap<String, String> = encode_parameters(&params).into_iter().collect();
        assert_eq!(pairs["id"], "100");
        assert_eq!(pairs["count"], "3");
        assert_eq!(pairs["active"], "true");
        assert_eq!(pairs["missing"], "");
        assert_eq!(pairs["contents"], r#"{"id":"112"}"#);
    }

    #[test]
    fn default_config() {
        let config = TransportConfig::default();
        assert!(config.validate_status);
        assert!(config.user_agent.starts_with("courier/"));
        assert_eq!(config.body_preview_limit, 256);
    }

    #[test]
    fn unreachable_host_reports_transport_error() {
        let transport = UreqTransport::default();
        let (tx, rx) = std::sync::mpsc::channel();
        transport.send(
            TransportRequest {
                url: "http://127.0.0.1:1/never".to_string(),
                method: HttpMethod::Get,
                parameters: Parameters::new(),
                headers: Headers::new(),
                timeout: Duration::from_secs(2),
            },
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        let outcome = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(matches!(
            outcome,
            Err(NetworkError::Transport(_)) | Err(NetworkError::Timeout(_))
        ));
    }
}
