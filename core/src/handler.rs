//! Request and response interceptors.
//!
//! Handlers run in the order they were added to the descriptor.
//!
//! - Request handlers run before dispatch. The first one that responds ends
//!   the pipeline with its result and the transport is never called.
//! - Response handlers run on the transport result. A handler that responds
//!   replaces the running result; one that continues leaves it as is. The
//!   chain stops as soon as a handler responds with a failure. A failure
//!   coming from the transport still reaches every handler until one of
//!   them replaces it.
//!
//! Closures with the right signature are handlers too.

use std::sync::Arc;

use crate::request::Request;
use crate::response::DataResult;

/// What a handler decided.
#[derive(Debug)]
pub enum Intercept {
    /// No opinion; carry on with the current result.
    Continue,
    /// Use this result instead.
    Respond(DataResult),
}

pub trait RequestHandler: Send + Sync {
    fn handle(&self, request: &Request) -> Intercept;
}

pub trait ResponseHandler: Send + Sync {
    fn handle(&self, result: &DataResult) -> Intercept;
}

impl<F> RequestHandler for F
where
    F: Fn(&Request) -> Intercept + Send + Sync,
{
    fn handle(&self, request: &Request) -> Intercept {
        self(request)
    }
}

impl<F> ResponseHandler for F
where
    F: Fn(&DataResult) -> Intercept + Send + Sync,
{
    fn handle(&self, result: &DataResult) -> Intercept {
        self(result)
    }
}

/// Run request handlers until one responds.
pub fn run_request_handlers(
    handlers: &[Arc<dyn RequestHandler>],
    request: &Request,
) -> Option<DataResult> {
    handlers.iter().find_map(|handler| match handler.handle(request) {
        Intercept::Continue => None,
        Intercept::Respond(result) => Some(result),
    })
}

/// Thread `result` through the response handlers.
pub fn run_response_handlers(handlers: &[Arc<dyn ResponseHandler>], result: DataResult) -> DataResult {
    let mut result = result;
    for handler in handlers {
        if let Intercept::Respond(replacement) = handler.handle(&result) {
            let failed = replacement.is_err();
            result = replacement;
            if failed {
                break;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use crate::descriptor::RequestDescriptor;
    use crate::error::NetworkError;
    use crate::response::Response;

    fn request() -> Request {
        Request::from_descriptor(&RequestDescriptor::get("https://x.com", "/get"), None).unwrap()
    }

    fn ok(body: &'static str) -> DataResult {
        Ok(Response::new(Bytes::from_static(body.as_bytes())))
    }

    fn body(result: &DataResult) -> &[u8] {
        &result.as_ref().unwrap().result
    }

    struct Counting {
        calls: Arc<AtomicUsize>,
        outcome: fn() -> Intercept,
    }

    impl RequestHandler for Counting {
        fn handle(&self, _request: &Request) -> Intercept {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    #[test]
    fn request_chain_stops_at_first_response() {
        let calls: Vec<Arc<AtomicUsize>> = (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
        let handlers: Vec<Arc<dyn RequestHandler>> = vec![
            Arc::new(Counting { calls: calls[0].clone(), outcome: || Intercept::Continue }),
            Arc::new(Counting { calls: calls[1].clone(), outcome: || Intercept::Respond(ok("cached")) }),
            Arc::new(Counting { calls: calls[2].clone(), outcome: || Intercept::Continue }),
        ];

        let result = run_request_handlers(&handlers, &request()).expect("second handler responds");
        assert_eq!(body(&result), b"cached");
        assert_eq!(calls[0].load(Ordering::SeqCst), 1);
        assert_eq!(calls[1].load(Ordering::SeqCst), 1);
        assert_eq!(calls[2].load(Ordering::SeqCst), 0);
    }

    #[test]
    fn request_chain_all_continue() {
        let handlers: Vec<Arc<dyn RequestHandler>> = vec![
            Arc::new(|_: &Request| Intercept::Continue),
            Arc::new(|_: &Request| Intercept::Continue),
        ];
        assert!(run_request_handlers(&handlers, &request()).is_none());
        assert!(run_request_handlers(&[], &request()).is_none());
    }

    #[test]
    fn request_handler_can_read_resolved_request() {
        let handlers: Vec<Arc<dyn RequestHandler>> = vec![Arc::new(|r: &Request| {
            if r.url() == "https://x.com/get" {
                Intercept::Respond(Err(NetworkError::Handler("blocked".to_string())))
            } else {
                Intercept::Continue
            }
        })];
        let result = run_request_handlers(&handlers, &request()).unwrap();
        assert!(matches!(result, Err(NetworkError::Handler(_))));
    }

    #[test]
    fn response_chain_threads_replacements() {
        let handlers: Vec<Arc<dyn ResponseHandler>> = vec![
            Arc::new(|_: &DataResult| Intercept::Respond(ok("first"))),
            Arc::new(|_: &DataResult| Intercept::Continue),
            Arc::new(|r: &DataResult| {
                assert_eq!(body(r), b"first");
                Intercept::Respond(ok("third"))
            }),
        ];
        let result = run_response_handlers(&handlers, ok("original"));
        assert_eq!(body(&result), b"third");
    }

    #[test]
    fn response_chain_stops_on_failure() {
        let reached = Arc::new(AtomicUsize::new(0));
        let counter = reached.clone();
        let handlers: Vec<Arc<dyn ResponseHandler>> = vec![
            Arc::new(|_: &DataResult| {
                Intercept::Respond(Err(NetworkError::Handler("session expired".to_string())))
            }),
            Arc::new(move |_: &DataResult| {
                counter.fetch_add(1, Ordering::SeqCst);
                Intercept::Respond(ok("recovered"))
            }),
        ];
        let result = run_response_handlers(&handlers, ok("original"));
        assert!(matches!(result, Err(NetworkError::Handler(msg)) if msg == "session expired"));
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn response_chain_can_recover_transport_failure() {
        let handlers: Vec<Arc<dyn ResponseHandler>> = vec![Arc::new(|r: &DataResult| match r {
            Err(NetworkError::Timeout(_)) => Intercept::Respond(ok("fallback")),
            _ => Intercept::Continue,
        })];
        let failed: DataResult = Err(NetworkError::Timeout(std::time::Duration::from_secs(1)));
        let result = run_response_handlers(&handlers, failed);
        assert_eq!(body(&result), b"fallback");
    }

    #[test]
    fn transport_failure_passes_continuing_handlers() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handlers: Vec<Arc<dyn ResponseHandler>> = vec![
            Arc::new(move |r: &DataResult| {
                assert!(r.is_err());
                counter.fetch_add(1, Ordering::SeqCst);
                Intercept::Continue
            }),
            Arc::new(|r: &DataResult| match r {
                Err(NetworkError::Cancelled) => Intercept::Respond(ok("retried elsewhere")),
                _ => Intercept::Continue,
            }),
        ];
        let result = run_response_handlers(&handlers, Err(NetworkError::Cancelled));
        assert_eq!(body(&result), b"retried elsewhere");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn response_chain_empty_passes_through() {
        let result = run_response_handlers(&[], ok("untouched"));
        assert_eq!(body(&result), b"untouched");
    }
}
