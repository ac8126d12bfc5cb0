//! Queued requests and per-request dispatch.
//!
//! Each queued request owns its result shapes and callback behind a
//! [`Dispatch`] trait object, so requests with unrelated result types share
//! one queue. Dispatch consumes itself, so a request's callback can fire at
//! most once.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::Request;
use http_batch_core::MultipartPart;

use crate::callback::{BatchCallback, Failure};
use crate::handler::UnsuccessfulResponseHandler;
use crate::shape::Shape;

/// Final outcome of one dispatched part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Succeeded,
    Failed,
}

/// Type-erased decode-and-notify step of one queued request.
pub(crate) trait Dispatch: Send {
    /// Decode the part and invoke exactly one callback method.
    fn dispatch(self: Box<Self>, part: &MultipartPart) -> Outcome;

    fn success_shape(&self) -> &'static str;

    fn error_shape(&self) -> &'static str;
}

pub(crate) struct TypedDispatch<S, E, C> {
    success: S,
    error: E,
    callback: C,
}

impl<S, E, C> TypedDispatch<S, E, C> {
    pub(crate) fn new(success: S, error: E, callback: C) -> Self {
        Self {
            success,
            error,
            callback,
        }
    }
}

impl<S, E, C> Dispatch for TypedDispatch<S, E, C>
where
    S: Shape,
    E: Shape,
    C: BatchCallback<S::Output, E::Output>,
{
    fn dispatch(self: Box<Self>, part: &MultipartPart) -> Outcome {
        let TypedDispatch {
            success,
            error,
            mut callback,
        } = *self;
        let status = part.status;

        let decoded = if part.is_success() {
            match success.decode(&part.body) {
                Ok(value) => {
                    callback.on_success(value, &part.headers);
                    return Outcome::Succeeded;
                }
                Err(err) => Err((success.name(), err)),
            }
        } else {
            error.decode(&part.body).map_err(|err| (error.name(), err))
        };

        let failure = match decoded {
            Ok(error) => Failure::Status { status, error },
            Err((shape, error)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    content_id = part.content_id,
                    status = status.as_u16(),
                    shape,
                    error = %error,
                    "failed to decode batch response part"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = shape;
                Failure::Decode { status, error }
            }
        };
        callback.on_failure(failure, &part.headers);
        Outcome::Failed
    }

    fn success_shape(&self) -> &'static str {
        self.success.name()
    }

    fn error_shape(&self) -> &'static str {
        self.error.name()
    }
}

/// One request waiting in a batch.
pub struct QueuedRequest {
    pub(crate) request: Request<Bytes>,
    pub(crate) handler: Option<Arc<dyn UnsuccessfulResponseHandler>>,
    pub(crate) dispatch: Box<dyn Dispatch>,
}

impl QueuedRequest {
    pub(crate) fn new(
        request: Request<Bytes>,
        handler: Option<Arc<dyn UnsuccessfulResponseHandler>>,
        dispatch: Box<dyn Dispatch>,
    ) -> Self {
        Self {
            request,
            handler,
            dispatch,
        }
    }

    /// The request as it will be sent in the next round.
    pub fn request(&self) -> &Request<Bytes> {
        &self.request
    }

    /// Name of the type 2xx bodies decode into.
    pub fn success_shape(&self) -> &'static str {
        self.dispatch.success_shape()
    }

    /// Name of the type non-2xx bodies decode into.
    pub fn error_shape(&self) -> &'static str {
        self.dispatch.error_shape()
    }

    /// Whether an unsuccessful-response handler is attached.
    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }
}

impl fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("success_shape", &self.success_shape())
            .field("error_shape", &self.error_shape())
            .field("has_handler", &self.has_handler())
            .finish()
    }
}

/// Ordered registry of pending requests.
///
/// Position in the queue is the request's position in the next outgoing
/// batch, and so its `Content-ID`.
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    items: Vec<QueuedRequest>,
}

impl RequestQueue {
    pub(crate) fn push(&mut self, item: QueuedRequest) {
        self.items.push(item);
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn as_slice(&self) -> &[QueuedRequest] {
        &self.items
    }

    /// Take every pending request, leaving the queue empty.
    pub(crate) fn drain(&mut self) -> Vec<QueuedRequest> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::callback_fn;
    use crate::shape::{Json, NoContent};
    use http::{HeaderMap, StatusCode};
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Seen {
        successes: Vec<String>,
        failures: Vec<(StatusCode, bool)>,
    }

    fn recording(seen: Arc<Mutex<Seen>>) -> Box<dyn Dispatch> {
        let on_failure = seen.clone();
        Box::new(TypedDispatch::new(
            Json::<String>::new(),
            Json::<String>::new(),
            callback_fn(
                move |value: String, _: &HeaderMap| seen.lock().unwrap().successes.push(value),
                move |failure: Failure<String>, _: &HeaderMap| {
                    on_failure
                        .lock()
                        .unwrap()
                        .failures
                        .push((failure.status(), failure.is_decode()))
                },
            ),
        ))
    }

    fn part(status: StatusCode, body: &'static str) -> MultipartPart {
        MultipartPart {
            content_id: 1,
            status,
            headers: HeaderMap::new(),
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_dispatch_success() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let outcome = recording(seen.clone()).dispatch(&part(StatusCode::OK, r#""egg""#));
        assert_eq!(outcome, Outcome::Succeeded);
        assert_eq!(seen.lock().unwrap().successes, vec!["egg".to_string()]);
    }

    #[test]
    fn test_dispatch_status_failure() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let outcome = recording(seen.clone()).dispatch(&part(StatusCode::NOT_FOUND, r#""gone""#));
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(
            seen.lock().unwrap().failures,
            vec![(StatusCode::NOT_FOUND, false)]
        );
    }

    #[test]
    fn test_dispatch_decode_failure_on_success_status() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let outcome = recording(seen.clone()).dispatch(&part(StatusCode::OK, "not json"));
        assert_eq!(outcome, Outcome::Failed);
        let seen = seen.lock().unwrap();
        assert!(seen.successes.is_empty());
        assert_eq!(seen.failures, vec![(StatusCode::OK, true)]);
    }

    #[test]
    fn test_dispatch_decode_failure_on_error_status() {
        let seen = Arc::new(Mutex::new(Seen::default()));
        recording(seen.clone()).dispatch(&part(StatusCode::UNAUTHORIZED, ""));
        assert_eq!(
            seen.lock().unwrap().failures,
            vec![(StatusCode::UNAUTHORIZED, true)]
        );
    }

    #[test]
    fn test_no_content_success_with_empty_body() {
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let dispatch: Box<dyn Dispatch> = Box::new(TypedDispatch::new(
            NoContent,
            NoContent,
            callback_fn(
                move |(), _: &HeaderMap| *counter.lock().unwrap() += 1,
                |_: Failure<()>, _: &HeaderMap| panic!("unexpected failure"),
            ),
        ));
        assert_eq!(dispatch.success_shape(), "()");
        assert_eq!(
            dispatch.dispatch(&part(StatusCode::NO_CONTENT, "")),
            Outcome::Succeeded
        );
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[test]
    fn test_queue_drain_keeps_order() {
        let noop = || -> Box<dyn Dispatch> {
            Box::new(TypedDispatch::new(
                NoContent,
                NoContent,
                callback_fn(|(), _: &HeaderMap| {}, |_: Failure<()>, _: &HeaderMap| {}),
            ))
        };
        let request = |path: &str| {
            Request::builder()
                .uri(path)
                .body(Bytes::new())
                .unwrap()
        };

        let mut queue = RequestQueue::default();
        queue.push(QueuedRequest::new(request("/a"), None, noop()));
        queue.push(QueuedRequest::new(request("/b"), None, noop()));
        assert_eq!(queue.len(), 2);

        let paths: Vec<_> = queue
            .drain()
            .iter()
            .map(|item| item.request().uri().path().to_string())
            .collect();
        assert_eq!(paths, vec!["/a", "/b"]);
        assert!(queue.is_empty());
    }
}
