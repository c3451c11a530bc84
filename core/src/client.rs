//! Request execution engine.
//!
//! # Design
//! `Client` owns an injected [`Transport`] and a [`Registry`]; there is no
//! global state, so tests and applications can run any number of clients side
//! by side. One pipeline serves all three result shapes:
//!
//! ```text
//! validate -> resolve record -> request handlers -> register -> transport
//!     -> response handlers -> result-key extraction -> (json | decode) -> callback
//! ```
//!
//! Everything after the transport runs on whatever thread the transport
//! completes on. Records with generated tokens are dropped from the registry
//! as soon as the transport reports back; records with caller tokens stay so
//! that [`Client::retry`] can re-dispatch them.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::descriptor::RequestDescriptor;
use crate::error::NetworkError;
use crate::handler::{run_request_handlers, run_response_handlers};
use crate::registry::Registry;
use crate::request::{DataCompletion, Request};
use crate::response::{DataResult, Response};
use crate::transport::{Transport, TransportConfig, TransportResult, UreqTransport};

#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    registry: Arc<Registry>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            registry: Arc::new(Registry::new()),
        }
    }

    /// A client backed by [`UreqTransport`].
    pub fn with_config(config: TransportConfig) -> Self {
        Self::new(Arc::new(UreqTransport::new(config)))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Fetch the response body as raw bytes (narrowed by the result key, if any).
    ///
    /// Returns the request record unless validation or encoding failed, in
    /// which case `completion` has already been called with the error.
    pub fn fetch_data<F>(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
        completion: F,
    ) -> Option<Arc<Request>>
    where
        F: Fn(DataResult) + Send + Sync + 'static,
    {
        self.execute(descriptor, token, Arc::new(completion))
    }

    /// Fetch the response body as untyped JSON.
    pub fn fetch_json<F>(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
        completion: F,
    ) -> Option<Arc<Request>>
    where
        F: Fn(Result<Response<Value>, NetworkError>) + Send + Sync + 'static,
    {
        self.execute(
            descriptor,
            token,
            Arc::new(move |result: DataResult| completion(result.and_then(|response| response.into_json()))),
        )
    }

    /// Fetch the response body decoded into `T`, using the descriptor's
    /// response key style.
    pub fn fetch_decodable<T, F>(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
        completion: F,
    ) -> Option<Arc<Request>>
    where
        T: DeserializeOwned + 'static,
        F: Fn(Result<Response<T>, NetworkError>) + Send + Sync + 'static,
    {
        let style = descriptor.decode_key_style();
        self.execute(
            descriptor,
            token,
            Arc::new(move |result: DataResult| {
                completion(result.and_then(|response| response.decode::<T>(style)))
            }),
        )
    }

    /// Future form of [`fetch_data`](Self::fetch_data). Resolves with the
    /// first outcome; later retries of the same token are not observed.
    pub async fn fetch_data_async(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<Response<Bytes>, NetworkError> {
        let (callback, outcome) = first_outcome();
        self.fetch_data(descriptor, token, callback);
        outcome.await.unwrap_or(Err(NetworkError::Cancelled))
    }

    pub async fn fetch_json_async(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<Response<Value>, NetworkError> {
        let (callback, outcome) = first_outcome();
        self.fetch_json(descriptor, token, callback);
        outcome.await.unwrap_or(Err(NetworkError::Cancelled))
    }

    pub async fn fetch_decodable_async<T>(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
    ) -> Result<Response<T>, NetworkError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (callback, outcome) = first_outcome();
        self.fetch_decodable(descriptor, token, callback);
        outcome.await.unwrap_or(Err(NetworkError::Cancelled))
    }

    /// Stop tracking `token`. The transport operation is left running and its
    /// completion still fires.
    pub fn cancel(&self, token: &str) {
        if self.registry.deregister(token).is_some() {
            tracing::debug!(token, "stopped tracking request");
        }
    }

    /// Cancel every operation at the transport layer and forget every record.
    pub fn cancel_all(&self) {
        self.registry.cancel_all(self.transport.as_ref());
    }

    /// Re-dispatch the record registered under `token` with its stored
    /// completion. Validation and request handlers are not run again.
    pub fn retry(&self, token: &str) -> bool {
        let Some(request) = self.registry.get(token) else {
            tracing::debug!(token, "retry requested for unknown token");
            return false;
        };
        let Some(completion) = request.completion() else {
            tracing::debug!(token, "retry requested for a request that never dispatched");
            return false;
        };
        tracing::debug!(token, "retrying request");
        self.dispatch(&request, completion);
        true
    }

    fn execute(
        &self,
        descriptor: &RequestDescriptor,
        token: Option<&str>,
        completion: DataCompletion,
    ) -> Option<Arc<Request>> {
        if let Err(err) = descriptor.validate() {
            tracing::debug!(error = %err, url = %descriptor.resolved_url(), "descriptor rejected");
            completion(Err(err));
            return None;
        }
        let request = match Request::from_descriptor(descriptor, token) {
            Ok(request) => Arc::new(request),
            Err(err) => {
                tracing::debug!(error = %err, url = %descriptor.resolved_url(), "failed to resolve request");
                completion(Err(err));
                return None;
            }
        };
        if let Some(result) = run_request_handlers(request.request_handlers(), &request) {
            tracing::debug!(token = request.token(), "request handler answered before dispatch");
            completion(result.map(|response| response.attach(&request)));
            return Some(request);
        }
        self.dispatch(&request, completion);
        Some(request)
    }

    fn dispatch(&self, request: &Arc<Request>, completion: DataCompletion) {
        let generation = self.registry.generation();
        request.set_completion(Arc::clone(&completion));
        self.registry.register(request.token(), Arc::clone(request));
        tracing::debug!(
            token = request.token(),
            method = %request.method(),
            url = request.url(),
            "dispatching request"
        );

        let registry = Arc::clone(&self.registry);
        let record = Arc::clone(request);
        let handle = self.transport.send(
            request.transport_request(),
            Box::new(move |outcome| complete(&registry, &record, outcome, &completion)),
        );
        request.set_transport_handle(handle);

        // A cancel-all that ran while `send` was in progress missed the handle.
        if self.registry.generation() != generation {
            tracing::debug!(token = request.token(), "cancel-all raced dispatch");
            request.cancel_transport();
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn complete(
    registry: &Registry,
    request: &Arc<Request>,
    outcome: TransportResult,
    completion: &DataCompletion,
) {
    if !request.has_caller_token() {
        registry.deregister(request.token());
    }

    let result = outcome.map(|response| Response::from_transport(response, request));
    let result = run_response_handlers(request.response_handlers(), result);
    let result = match request.result_key() {
        Some(key) => result.and_then(|response| response.extract(key)),
        None => result,
    };

    match &result {
        Ok(response) => {
            tracing::debug!(token = request.token(), status = response.status, "request completed")
        }
        Err(err) => tracing::debug!(token = request.token(), error = %err, "request failed"),
    }
    completion(result);
}

type Outcome<T> = Result<Response<T>, NetworkError>;

/// A callback that forwards only its first invocation to the returned receiver.
fn first_outcome<T: Send + 'static>() -> (
    impl Fn(Outcome<T>) + Send + Sync + 'static,
    oneshot::Receiver<Outcome<T>>,
) {
    let (tx, rx) = oneshot::channel();
    let sender = Mutex::new(Some(tx));
    let callback = move |outcome: Outcome<T>| {
        let tx = sender.lock().take();
        if let Some(tx) = tx {
            let _ = tx.send(outcome);
        }
    };
    (callback, rx)
}
