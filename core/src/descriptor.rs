//! Declarative request descriptions.
//!
//! # Design
//! A `RequestDescriptor` says what a request looks like: where it goes, which
//! verb it uses, which fields it carries, how the response should be read,
//! and which handlers wrap it. It performs no I/O. The engine turns it into a
//! [`Request`](crate::request::Request) record once per execution and never
//! looks at it again, so retries reuse the record rather than the descriptor.
//!
//! Request fields are captured from any `Serialize` value and kept as JSON.
//! Encoding failures are held until the descriptor is executed so they reach
//! the completion callback like every other failure.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::error::NetworkError;
use crate::handler::{RequestHandler, ResponseHandler};
use crate::http::{Header, Headers, HttpMethod, Parameters};
use crate::json::{self, KeyStyle};

/// Timeout applied when a descriptor does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

type Validator = dyn Fn(&RequestDescriptor) -> Result<(), NetworkError> + Send + Sync;

/// Join `base_url` and `path` with exactly one `/` between them.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Caller-authored description of one logical request.
#[derive(Clone)]
pub struct RequestDescriptor {
    base_url: String,
    path: String,
    method: HttpMethod,
    fields: Result<Value, String>,
    key_style: KeyStyle,
    response_key_style: KeyStyle,
    header: Option<Header>,
    extra_headers: Headers,
    timeout: Duration,
    result_key: Option<String>,
    request_key: Option<String>,
    request_handlers: Vec<Arc<dyn RequestHandler>>,
    response_handlers: Vec<Arc<dyn ResponseHandler>>,
    validator: Option<Arc<Validator>>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, base_url: &str, path: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            path: path.to_string(),
            method,
            fields: Ok(Value::Null),
            key_style: KeyStyle::Literal,
            response_key_style: KeyStyle::Literal,
            header: None,
            extra_headers: Headers::new(),
            timeout: DEFAULT_TIMEOUT,
            result_key: None,
            request_key: None,
            request_handlers: Vec::new(),
            response_handlers: Vec::new(),
            validator: None,
        }
    }

    pub fn connect(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Connect, base_url, path)
    }

    pub fn delete(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Delete, base_url, path)
    }

    pub fn get(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Get, base_url, path)
    }

    pub fn head(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Head, base_url, path)
    }

    pub fn options(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Options, base_url, path)
    }

    pub fn patch(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Patch, base_url, path)
    }

    pub fn post(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Post, base_url, path)
    }

    pub fn put(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Put, base_url, path)
    }

    pub fn trace(base_url: &str, path: &str) -> Self {
        Self::new(HttpMethod::Trace, base_url, path)
    }

    /// Use the JSON encoding of `value` as the request fields.
    ///
    /// The value must encode to an object (or to `null` for no fields).
    pub fn fields<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.fields = serde_json::to_value(value).map_err(|e| e.to_string());
        self
    }

    /// Key style applied to the request fields.
    pub fn key_style(mut self, style: KeyStyle) -> Self {
        self.key_style = style;
        self
    }

    /// Key style applied when decoding a typed response.
    pub fn response_key_style(mut self, style: KeyStyle) -> Self {
        self.response_key_style = style;
        self
    }

    pub fn header(mut self, header: Header) -> Self {
        self.header = Some(header);
        self
    }

    /// Add a single header. It overrides the same name set through [`header`](Self::header).
    pub fn header_value(mut self, name: &str, value: &str) -> Self {
        self.extra_headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Dotted path of the part of the response body to keep, e.g. `"respData.contents"`.
    pub fn result_key(mut self, key: &str) -> Self {
        self.result_key = Some(key.to_string());
        self
    }

    /// Nest all request fields under `key` instead of sending them flat.
    pub fn request_key(mut self, key: &str) -> Self {
        self.request_key = Some(key.to_string());
        self
    }

    pub fn request_handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.request_handlers.push(Arc::new(handler));
        self
    }

    pub fn response_handler(mut self, handler: impl ResponseHandler + 'static) -> Self {
        self.response_handlers.push(Arc::new(handler));
        self
    }

    /// Check run before anything else when the descriptor is executed.
    pub fn validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&RequestDescriptor) -> Result<(), NetworkError> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The encoded request fields, before key-style conversion and nesting.
    pub fn field_values(&self) -> Option<&Value> {
        self.fields.as_ref().ok()
    }

    pub fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    pub fn result_key_path(&self) -> Option<&str> {
        self.result_key.as_deref()
    }

    pub fn request_key_name(&self) -> Option<&str> {
        self.request_key.as_deref()
    }

    pub fn decode_key_style(&self) -> KeyStyle {
        self.response_key_style
    }

    pub fn request_handlers(&self) -> &[Arc<dyn RequestHandler>] {
        &self.request_handlers
    }

    pub fn response_handlers(&self) -> &[Arc<dyn ResponseHandler>] {
        &self.response_handlers
    }

    pub fn resolved_path(&self) -> &str {
        &self.path
    }

    pub fn resolved_url(&self) -> String {
        resolve_url(&self.base_url, &self.path)
    }

    pub fn resolved_headers(&self) -> Headers {
        let mut headers = Headers::new();
        if let Some(header) = &self.header {
            headers.extend(header.headers());
        }
        headers.extend(self.extra_headers.clone());
        headers
    }

    /// The fields as a parameter bag, key-style converted and nested under the
    /// request key when one is set.
    pub fn resolved_parameters(&self) -> Result<Parameters, NetworkError> {
        let fields = self.fields.as_ref().map_err(|e| NetworkError::Encode(e.clone()))?;
        let fields = json::encode(fields, self.key_style)?;
        let map = match fields {
            Value::Object(map) => map,
            Value::Null => Parameters::new(),
            other => {
                return Err(NetworkError::Encode(format!(
                    "request fields must encode to a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };
        match &self.request_key {
            None => Ok(map),
            Some(key) => {
                let mut nested = Parameters::new();
                nested.insert(key.clone(), Value::Object(map));
                Ok(nested)
            }
        }
    }

    pub fn validate(&self) -> Result<(), NetworkError> {
        match &self.validator {
            Some(validator) => validator(self),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .field("result_key", &self.result_key)
            .field("request_key", &self.request_key)
            .field("request_handlers", &self.request_handlers.len())
            .field("response_handlers", &self.response_handlers.len())
            .finish_non_exhaustive()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
