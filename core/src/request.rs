//! Resolved request records.
//!
//! # Design
//! A `Request` is what the engine actually executes: the descriptor's url,
//! headers and parameters resolved once, plus a token, a snapshot of the
//! handler lists, the completion callback and the live transport handle.
//! Retrying re-dispatches the same record, so nothing is resolved twice.
//!
//! Records are shared as `Arc<Request>` between the caller, the registry and
//! the transport callback. The two mutable slots are behind mutexes because
//! completions may arrive on any thread.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::descriptor::RequestDescriptor;
use crate::error::NetworkError;
use crate::handler::{RequestHandler, ResponseHandler};
use crate::http::{Headers, HttpMethod, Parameters, TransportRequest};
use crate::response::DataResult;
use crate::transport::TransportHandle;

/// Callback receiving the raw-bytes outcome. Kept on the record for retries,
/// so it may be called more than once.
pub type DataCompletion = Arc<dyn Fn(DataResult) + Send + Sync>;

pub struct Request {
    token: String,
    caller_token: bool,
    url: String,
    path: String,
    method: HttpMethod,
    parameters: Parameters,
    headers: Headers,
    timeout: Duration,
    result_key: Option<String>,
    request_handlers: Vec<Arc<dyn RequestHandler>>,
    response_handlers: Vec<Arc<dyn ResponseHandler>>,
    completion: Mutex<Option<DataCompletion>>,
    live: Mutex<Option<Box<dyn TransportHandle>>>,
}

impl Request {
    /// Resolve `descriptor` into a record. Without a caller token a fresh
    /// UUID is used and the record will not be kept for retry.
    pub fn from_descriptor(
        descriptor: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<Self, NetworkError> {
        let (token, caller_token) = match token {
            Some(token) => (token.to_string(), true),
            None => (Uuid::new_v4().to_string(), false),
        };
        Ok(Self {
            token,
            caller_token,
            url: descriptor.resolved_url(),
            path: descriptor.resolved_path().to_string(),
            method: descriptor.method(),
            parameters: descriptor.resolved_parameters()?,
            headers: descriptor.resolved_headers(),
            timeout: descriptor.timeout_duration(),
            result_key: descriptor.result_key_path().map(str::to_string),
            request_handlers: descriptor.request_handlers().to_vec(),
            response_handlers: descriptor.response_handlers().to_vec(),
            completion: Mutex::new(None),
            live: Mutex::new(None),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Whether the token came from the caller rather than being generated.
    pub fn has_caller_token(&self) -> bool {
        self.caller_token
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn result_key(&self) -> Option<&str> {
        self.result_key.as_deref()
    }

    pub fn request_handlers(&self) -> &[Arc<dyn RequestHandler>] {
        &self.request_handlers
    }

    pub fn response_handlers(&self) -> &[Arc<dyn ResponseHandler>] {
        &self.response_handlers
    }

    pub fn transport_request(&self) -> TransportRequest {
        TransportRequest {
            url: self.url.clone(),
            method: self.method,
            parameters: self.parameters.clone(),
            headers: self.headers.clone(),
            timeout: self.timeout,
        }
    }

    pub(crate) fn set_completion(&self, completion: DataCompletion) {
        *self.completion.lock() = Some(completion);
    }

    pub(crate) fn completion(&self) -> Option<DataCompletion> {
        self.completion.lock().clone()
    }

    pub(crate) fn set_transport_handle(&self, handle: Box<dyn TransportHandle>) {
        *self.live.lock() = Some(handle);
    }

    /// Abort this record's in-flight transport operation, if any.
    pub fn cancel_transport(&self) {
        if let Some(handle) = self.live.lock().as_ref() {
            tracing::debug!(token = %self.token, "cancelling transport operation");
            handle.cancel();
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("token", &self.token)
            .field("caller_token", &self.caller_token)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("parameters", &self.parameters)
            .field("timeout", &self.timeout)
            .field("result_key", &self.result_key)
            .finish_non_exhaustive()
    }
}
