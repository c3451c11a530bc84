//! Response records handed to completion callbacks.
//!
//! # Design
//! `Response<T>` is generic over the result shape: `Bytes` for raw data,
//! `serde_json::Value` for generic JSON, or the caller's own type. The
//! transport metadata travels with it unchanged whichever shape is chosen.
//!
//! The back-reference to the originating [`Request`] is a `Weak`, so holding
//! on to a response never keeps a request record (and its callbacks) alive.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::NetworkError;
use crate::http::{Headers, Metrics, TransportRequest, TransportResponse};
use crate::json::{self, KeyStyle};
use crate::request::Request;

/// Outcome of the raw-bytes stage of the pipeline. Handlers see and produce these.
pub type DataResult = Result<Response<Bytes>, NetworkError>;

/// Coarse classification of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Exactly 200.
    Success,
    Redirect,
    ClientError,
    ServerError,
    /// Anything else, including other 2xx codes.
    Failed,
}

impl StatusClass {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => StatusClass::Success,
            300..=399 => StatusClass::Redirect,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Response<T> {
    pub result: T,
    /// The full response body, before any result-key extraction.
    pub data: Option<Bytes>,
    pub request: Weak<Request>,
    pub token: Option<String>,
    pub status: u16,
    pub headers: Headers,
    /// The request exactly as the transport sent it.
    pub transport_request: Option<TransportRequest>,
    pub metrics: Option<Metrics>,
    /// Time spent extracting and decoding the body.
    pub serialization_duration: Duration,
}

impl<T> Response<T> {
    /// A response not backed by a transport round-trip, e.g. one produced by
    /// a handler. Status is 200.
    pub fn new(result: T) -> Self {
        Self {
            result,
            data: None,
            request: Weak::new(),
            token: None,
            status: 200,
            headers: Headers::new(),
            transport_request: None,
            metrics: None,
            serialization_duration: Duration::ZERO,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Point the back-reference at `request` unless it already points somewhere.
    pub(crate) fn attach(mut self, request: &Arc<Request>) -> Self {
        if self.request.upgrade().is_none() {
            self.request = Arc::downgrade(request);
        }
        if self.token.is_none() {
            self.token = Some(request.token().to_string());
        }
        self
    }

    /// Replace the result, keeping all metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            result: f(self.result),
            data: self.data,
            request: self.request,
            token: self.token,
            status: self.status,
            headers: self.headers,
            transport_request: self.transport_request,
            metrics: self.metrics,
            serialization_duration: self.serialization_duration,
        }
    }

    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_status(self.status)
    }

    pub fn is_success(&self) -> bool {
        self.status_class() == StatusClass::Success
    }

    pub fn is_failed(&self) -> bool {
        !self.is_success()
    }

    pub fn is_redirect(&self) -> bool {
        self.status_class() == StatusClass::Redirect
    }

    pub fn is_client_error(&self) -> bool {
        self.status_class() == StatusClass::ClientError
    }

    pub fn is_server_error(&self) -> bool {
        self.status_class() == StatusClass::ServerError
    }
}

impl Response<Bytes> {
    pub(crate) fn from_transport(response: TransportResponse, request: &Arc<Request>) -> Self {
        Self {
            result: response.body.clone(),
            data: Some(response.body),
            request: Arc::downgrade(request),
            token: Some(request.token().to_string()),
            status: response.status,
            headers: response.headers,
            transport_request: Some(response.request),
            metrics: Some(response.metrics),
            serialization_duration: Duration::ZERO,
        }
    }

    /// Parse the result bytes as untyped JSON.
    pub fn json(&self) -> Result<Value, NetworkError> {
        json::parse(&self.result)
    }

    /// Narrow the result to the value at the dotted `path`.
    pub fn extract(self, path: &str) -> Result<Self, NetworkError> {
        let started = Instant::now();
        let extracted = crate::mapper::extract(&self.result, path)?;
        let mut response = self.map(|_| extracted);
        response.serialization_duration += started.elapsed();
        Ok(response)
    }

    pub fn into_json(self) -> Result<Response<Value>, NetworkError> {
        let started = Instant::now();
        let value = self.json()?;
        let mut response = self.map(|_| value);
        response.serialization_duration += started.elapsed();
        Ok(response)
    }

    pub fn decode<T: DeserializeOwned>(self, style: KeyStyle) -> Result<Response<T>, NetworkError> {
        let started = Instant::now();
        let object = json::decode(&self.result, style)?;
        let mut response = self.map(|_| object);
        response.serialization_duration += started.elapsed();
        Ok(response)
    }
}
