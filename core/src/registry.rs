//! Token-indexed bookkeeping of in-flight and retryable requests.
//!
//! # Design
//! One mutex guards the whole map. Contention is low (one insert and at most
//! one removal per request) and every operation is a short map update, so a
//! finer-grained scheme would buy nothing. Locks are never held while calling
//! into a transport or a completion.
//!
//! The first record registered under a token wins; later registrations under
//! the same token are ignored.
//!
//! Every `cancel_all` bumps a generation counter. A dispatch that read the
//! counter before sending compares it again once its transport handle is
//! stored, so a cancel-all that landed in between still reaches it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::request::Request;
use crate::transport::Transport;

#[derive(Debug, Default)]
pub struct Registry {
    requests: Mutex<HashMap<String, Arc<Request>>>,
    generation: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `request` under `token`. Returns `false` (and keeps the existing
    /// record) when the token is already taken.
    pub fn register(&self, token: &str, request: Arc<Request>) -> bool {
        let mut requests = self.requests.lock();
        if requests.contains_key(token) {
            tracing::debug!(token, "token already registered, keeping first record");
            return false;
        }
        requests.insert(token.to_string(), request);
        true
    }

    /// Stop tracking `token`. No-op when it is unknown.
    pub fn deregister(&self, token: &str) -> Option<Arc<Request>> {
        self.requests.lock().remove(token)
    }

    pub fn get(&self, token: &str) -> Option<Arc<Request>> {
        self.requests.lock().get(token).cloned()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.requests.lock().contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.requests.lock().keys().cloned().collect()
    }

    /// Number of `cancel_all` calls so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cancel everything at the transport layer, then forget every record,
    /// including ones whose transport call already finished.
    pub fn cancel_all(&self, transport: &dyn Transport) {
        transport.cancel_all();
        let drained: Vec<Arc<Request>> = self.requests.lock().drain().map(|(_, r)| r).collect();
        self.generation.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(count = drained.len(), "cleared request registry");
        for request in drained {
            request.cancel_transport();
        }
    }
}
