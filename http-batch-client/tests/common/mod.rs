#![allow(dead_code)]

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_batch_client::{
    BatchCallback, BatchError, Boundary, Failure, GoogleJsonErrorContainer, Transport,
    UnsuccessfulResponseContext, UnsuccessfulResponseHandler,
};
use http_batch_core::{boundary_from_content_type, decode_requests, encode_responses};
use serde::Deserialize;

pub const BASE_URL: &str = "http://www.test.com/";
pub const TEST_BATCH_URL: &str = "http://www.testgoogleapis.com/batch";
pub const URI_TEMPLATE1: &str = "uri/template/1";
pub const URI_TEMPLATE2: &str = "uri/template/2";
pub const ERROR_MSG: &str = "Error message";
pub const ERROR_REASON: &str = "notFound";
pub const ERROR_CODE: u16 = 404;
pub const ERROR_DOMAIN: &str = "global";
pub const RESPONSE_BOUNDARY: &str = "ABCDEF";
pub const TEST_ID: &str = "Humpty Dumpty";
pub const TEST_KIND: &str = "Big Egg";
pub const TEST_NAME: &str = "James Bond";
pub const TEST_NUM: &str = "007";

#[derive(Debug, Deserialize)]
pub struct MockDataClass1 {
    pub id: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct MockDataClass2 {
    pub name: String,
    pub number: String,
}

pub fn request1() -> Request<Bytes> {
    Request::builder()
        .method(Method::GET)
        .uri(format!("{BASE_URL}{URI_TEMPLATE1}"))
        .body(Bytes::new())
        .unwrap()
}

pub fn request2() -> Request<Bytes> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("{BASE_URL}{URI_TEMPLATE2}"))
        .header(CONTENT_TYPE, "application/json")
        .body(Bytes::from_static(b"{}"))
        .unwrap()
}

pub fn error_content() -> String {
    format!(
        r#"{{"error": {{ "errors": [{{"domain": "{ERROR_DOMAIN}","reason": "{ERROR_REASON}", "message": "{ERROR_MSG}"}}],"code": {ERROR_CODE}, "message": "{ERROR_MSG}"}}}}"#
    )
}

// ============================================================================
// Callbacks
// ============================================================================

/// Invocation counters shared between a callback and the test body.
#[derive(Debug, Default)]
pub struct Calls {
    success: AtomicUsize,
    failure: AtomicUsize,
}

impl Calls {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn success(&self) -> usize {
        self.success.load(Ordering::SeqCst)
    }

    pub fn failure(&self) -> usize {
        self.failure.load(Ordering::SeqCst)
    }
}

/// Expects request 1's payload; never expects a failure.
pub struct TestCallback1(pub Arc<Calls>);

impl BatchCallback<MockDataClass1, GoogleJsonErrorContainer> for TestCallback1 {
    fn on_success(&mut self, value: MockDataClass1, _headers: &HeaderMap) {
        self.0.success.fetch_add(1, Ordering::SeqCst);
        assert_eq!(value.id, TEST_ID);
        assert_eq!(value.kind, TEST_KIND);
    }

    fn on_failure(&mut self, failure: Failure<GoogleJsonErrorContainer>, _headers: &HeaderMap) {
        self.0.failure.fetch_add(1, Ordering::SeqCst);
        panic!("TestCallback1 should not fail: {failure}");
    }
}

/// Expects request 2's payload, or the canned 404 error.
pub struct TestCallback2(pub Arc<Calls>);

impl BatchCallback<MockDataClass2, GoogleJsonErrorContainer> for TestCallback2 {
    fn on_success(&mut self, value: MockDataClass2, _headers: &HeaderMap) {
        self.0.success.fetch_add(1, Ordering::SeqCst);
        assert_eq!(value.name, TEST_NAME);
        assert_eq!(value.number, TEST_NUM);
    }

    fn on_failure(&mut self, failure: Failure<GoogleJsonErrorContainer>, _headers: &HeaderMap) {
        self.0.failure.fetch_add(1, Ordering::SeqCst);
        assert_eq!(failure.status(), StatusCode::NOT_FOUND);
        let container = failure.into_error().expect("status failure with decoded error");
        let error = container.error;
        let info = &error.errors[0];
        assert_eq!(info.domain, ERROR_DOMAIN);
        assert_eq!(info.reason, ERROR_REASON);
        assert_eq!(info.message, ERROR_MSG);
        assert_eq!(error.code, ERROR_CODE);
        assert_eq!(error.message, ERROR_MSG);
    }
}

/// A callback for a request with no meaningful bodies.
pub struct TestCallback3(pub Arc<Calls>);

impl BatchCallback<(), ()> for TestCallback3 {
    fn on_success(&mut self, (): (), _headers: &HeaderMap) {
        self.0.success.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&mut self, failure: Failure<()>, _headers: &HeaderMap) {
        self.0.failure.fetch_add(1, Ordering::SeqCst);
        assert!(!failure.is_decode());
    }
}

// ============================================================================
// Mock transport
// ============================================================================

type Responder = dyn Fn(&Request<Bytes>) -> Result<Response<Bytes>, BatchError> + Send + Sync;

/// Transport double that records every outer request and answers with a
/// caller-supplied function.
#[derive(Clone)]
pub struct MockTransport {
    responder: Arc<Responder>,
    sent: Arc<Mutex<Vec<Request<Bytes>>>>,
    delay: Option<Duration>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("sent", &self.sent_count())
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Request<Bytes>) -> Result<Response<Bytes>, BatchError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            sent: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn sent(&self) -> MutexGuard<'_, Vec<Request<Bytes>>> {
        self.sent.lock().unwrap()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Transport for MockTransport {
    fn send(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, BatchError>> + Send {
        let this = self.clone();
        async move {
            if let Some(delay) = this.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = (this.responder)(&request);
            this.sent.lock().unwrap().push(request);
            reply
        }
    }
}

/// A `multipart/mixed` reply with the given raw body.
pub fn multipart_reply(boundary: &str, body: String) -> Response<Bytes> {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, format!("multipart/mixed; boundary={boundary}"))
        .body(Bytes::from(body))
        .unwrap()
}

/// A transport that decodes each outer request and answers every inner
/// request with `answer`, as a batch endpoint would.
pub fn per_part_transport<F>(answer: F) -> MockTransport
where
    F: Fn(&Request<Bytes>) -> Response<Bytes> + Send + Sync + 'static,
{
    MockTransport::new(move |request| {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        let boundary = boundary_from_content_type(content_type)?;
        let inner = decode_requests(request.body(), &boundary)?;
        let responses: Vec<Response<Bytes>> = inner.iter().map(&answer).collect();

        let reply_boundary = Boundary::new(RESPONSE_BOUNDARY)?;
        let body = encode_responses(&responses, &reply_boundary);
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, reply_boundary.content_type())
            .body(body)
            .unwrap())
    })
}

pub fn status_response(status: StatusCode, body: &'static str) -> Response<Bytes> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json; charset=UTF-8")
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap()
}

// ============================================================================
// Google batch endpoint double
// ============================================================================

/// Switches flipped by [`EscalatingHandler`] to change the next reply.
#[derive(Debug, Default)]
pub struct AuthFlags {
    pub return_success_authenticated_content: AtomicBool,
    pub return_error_authenticated_content: AtomicBool,
}

/// Reproduces a Google batch endpoint answering the two test requests.
///
/// - `server_error`: request 2 fails with the canned 404 error
/// - `auth_error`: request 2 fails with a bodiless 401; once a handler flips
///   `flags`, the follow-up round (request 2 alone) gets a 200 or a 404
pub fn google_transport(server_error: bool, auth_error: bool, flags: Arc<AuthFlags>) -> MockTransport {
    MockTransport::new(move |_request| {
        let content1 = format!("{{\n \"id\": \"{TEST_ID}\",\n \"kind\": \"{TEST_KIND}\"\n}}");
        let content2 = format!(r#"{{"name": "{TEST_NAME}", "number": "{TEST_NUM}"}}"#);
        let error_content = error_content();
        let b = RESPONSE_BOUNDARY;

        let mut body = String::new();
        if flags.return_success_authenticated_content.load(Ordering::SeqCst) {
            body.push_str(&format!(
                "--{b}\nContent-Type: application/http\nContent-Transfer-Encoding: binary\nContent-ID: response-1\n\n\
                 HTTP/1.1 200 OK\nContent-Type: application/json; charset=UTF-8\nContent-Length: {}\n\n{content2}\n\n\
                 --{b}--\n\n",
                content2.len()
            ));
        } else if flags.return_error_authenticated_content.load(Ordering::SeqCst) {
            // Opens with a delimiter like every other reply here; a preamble
            // would be discarded anyway.
            body.push_str(&format!(
                "--{b}\nContent-Type: application/http\nContent-Transfer-Encoding: binary\nContent-ID: response-1\n\n\
                 HTTP/1.1 {ERROR_CODE} Not Found\nContent-Type: application/json; charset=UTF-8\nContent-Length: {}\n\n{error_content}\n\n\
                 --{b}--\n\n",
                error_content.len()
            ));
        } else {
            body.push_str(&format!(
                "--{b}\nContent-Type: application/http\nContent-Transfer-Encoding: binary\nContent-ID: response-1\n\n\
                 HTTP/1.1 200 OK\nContent-Type: application/json; charset=UTF-8\nContent-Length: {}\n\n{content1}\n\n\
                 --{b}\nContent-Type: application/http\nContent-Transfer-Encoding: binary\nContent-ID: response-2\n\n",
                content1.len()
            ));
            if server_error {
                body.push_str(&format!(
                    "HTTP/1.1 {ERROR_CODE} Not Found\nContent-Type: application/json; charset=UTF-8\nContent-Length: {}\n\n{error_content}\n\n\
                     --{b}--\n\n",
                    error_content.len()
                ));
            } else if auth_error {
                body.push_str(&format!(
                    "HTTP/1.1 401 Unauthorized\nContent-Type: application/json; charset=UTF-8\n\n--{b}--\n\n"
                ));
            } else {
                body.push_str(&format!(
                    "HTTP/1.1 200 OK\nContent-Type: application/json; charset=UTF-8\nContent-Length: {}\n\n{content2}\n\n\
                     --{b}--\n\n",
                    content2.len()
                ));
            }
        }

        Ok(multipart_reply(RESPONSE_BOUNDARY, body))
    })
}

/// Flips the endpoint into "authenticated" mode on the first 401 and asks
/// for a retry; declines once the endpoint already answers with an error.
#[derive(Debug)]
pub struct EscalatingHandler {
    pub flags: Arc<AuthFlags>,
    pub return_success_authenticated_content: bool,
    pub invocations: AtomicUsize,
}

impl EscalatingHandler {
    pub fn new(flags: Arc<AuthFlags>, return_success_authenticated_content: bool) -> Arc<Self> {
        Arc::new(Self {
            flags,
            return_success_authenticated_content,
            invocations: AtomicUsize::new(0),
        })
    }
}

impl UnsuccessfulResponseHandler for EscalatingHandler {
    fn handle_response(&self, _ctx: &mut UnsuccessfulResponseContext<'_>) -> bool {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        if self.flags.return_error_authenticated_content.load(Ordering::SeqCst) {
            return false;
        }
        if self.return_success_authenticated_content {
            self.flags
                .return_success_authenticated_content
                .store(true, Ordering::SeqCst);
        } else {
            self.flags
                .return_error_authenticated_content
                .store(true, Ordering::SeqCst);
        }
        true
    }
}
