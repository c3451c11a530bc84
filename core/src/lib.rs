//! Declarative HTTP client core.
//!
//! # Overview
//! A [`RequestDescriptor`] says what to call: method, base url and path,
//! parameters, headers, timeout, an optional dotted result key and the
//! interceptors to run. The [`Client`] engine validates it, resolves it into a
//! [`Request`] record under a token, runs request handlers, hands the record
//! to a [`Transport`], runs response handlers, narrows the body to the result
//! key and delivers raw bytes, untyped JSON, or a decoded value.
//!
//! # Design
//! - The engine does no I/O of its own. [`Transport`] is the boundary;
//!   [`UreqTransport`] is the blocking implementation shipped here and tests
//!   substitute scripted fakes.
//! - Records are tracked in a [`Registry`] by token so that callers can
//!   cancel them or retry them without re-resolving the descriptor.
//! - Completions run on whatever thread the transport finishes on.
//! - Every failure is a [`NetworkError`]; nothing panics on bad input.

pub mod client;
pub mod descriptor;
pub mod error;
pub mod handler;
pub mod http;
pub mod json;
pub mod mapper;
pub mod registry;
pub mod request;
pub mod response;
pub mod transport;

pub use client::Client;
pub use descriptor::RequestDescriptor;
pub use error::NetworkError;
pub use handler::{Intercept, RequestHandler, ResponseHandler};
pub use http::{Header, Headers, HttpMethod, Metrics, Parameters, TransportRequest, TransportResponse};
pub use json::KeyStyle;
pub use registry::Registry;
pub use request::Request;
pub use response::{DataResult, Response, StatusClass};
pub use transport::{Transport, TransportConfig, TransportHandle, UreqTransport};
