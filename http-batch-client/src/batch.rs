//! Batch queueing and execution.
//!
//! A [`Batch`] collects requests, sends them as one `multipart/mixed` POST,
//! and routes every response part to the callback of the request at the same
//! position. Requests whose unsuccessful-response handler asks for a retry
//! are sent again in a follow-up round, until none remain or the
//! [`RetryPolicy`](crate::RetryPolicy) cap is reached.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method, Request, Response};
use http_batch_core::{MultipartPart, boundary_from_content_type, decode, encode_with_boundary};
use serde::de::DeserializeOwned;

use crate::BatchError;
use crate::callback::BatchCallback;
use crate::client::BatchClient;
use crate::handler::{UnsuccessfulResponseContext, UnsuccessfulResponseHandler};
use crate::json_error::GoogleJsonErrorContainer;
use crate::queue::{Outcome, QueuedRequest, RequestQueue, TypedDispatch};
use crate::shape::{Json, Shape};
use crate::transport::{HyperTransport, Transport};

/// Totals of one successful [`Batch::execute`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of outer requests sent, including the initial one.
    pub rounds: u32,
    /// Callbacks that received `on_success`.
    pub succeeded: usize,
    /// Callbacks that received `on_failure`.
    pub failed: usize,
}

/// A queue of requests to be sent together.
///
/// Created by [`BatchClient::batch`]. A batch can be executed more than once:
/// each successful execution drains it, and requests can be queued again
/// afterwards.
pub struct Batch<T = HyperTransport> {
    client: BatchClient<T>,
    queue: RequestQueue,
}

impl<T> fmt::Debug for Batch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Batch<T> {
    pub(crate) fn new(client: BatchClient<T>) -> Self {
        Self {
            client,
            queue: RequestQueue::default(),
        }
    }

    /// Queue a request.
    ///
    /// 2xx response bodies are decoded with `success`, all others with
    /// `error`, and the result is delivered to `callback`.
    pub fn queue<S, E, C>(
        &mut self,
        request: Request<Bytes>,
        success: S,
        error: E,
        callback: C,
    ) -> &mut Self
    where
        S: Shape,
        E: Shape,
        C: BatchCallback<S::Output, E::Output> + 'static,
    {
        self.push(request, None, success, error, callback)
    }

    /// Queue a request with an unsuccessful-response handler.
    ///
    /// The handler sees every non-2xx response for this request and may ask
    /// for it to be sent again in the next round.
    pub fn queue_with_handler<S, E, C>(
        &mut self,
        request: Request<Bytes>,
        handler: Arc<dyn UnsuccessfulResponseHandler>,
        success: S,
        error: E,
        callback: C,
    ) -> &mut Self
    where
        S: Shape,
        E: Shape,
        C: BatchCallback<S::Output, E::Output> + 'static,
    {
        self.push(request, Some(handler), success, error, callback)
    }

    /// Queue a request whose success and error bodies are both JSON.
    pub fn queue_json<R, E, C>(&mut self, request: Request<Bytes>, callback: C) -> &mut Self
    where
        R: DeserializeOwned + 'static,
        E: DeserializeOwned + 'static,
        C: BatchCallback<R, E> + 'static,
    {
        self.queue(request, Json::<R>::new(), Json::<E>::new(), callback)
    }

    /// Queue a request whose success body is JSON and whose error body is a
    /// [`GoogleJsonErrorContainer`].
    pub fn queue_google_json<R, C>(&mut self, request: Request<Bytes>, callback: C) -> &mut Self
    where
        R: DeserializeOwned + 'static,
        C: BatchCallback<R, GoogleJsonErrorContainer> + 'static,
    {
        self.queue_json::<R, GoogleJsonErrorContainer, C>(request, callback)
    }

    fn push<S, E, C>(
        &mut self,
        request: Request<Bytes>,
        handler: Option<Arc<dyn UnsuccessfulResponseHandler>>,
        success: S,
        error: E,
        callback: C,
    ) -> &mut Self
    where
        S: Shape,
        E: Shape,
        C: BatchCallback<S::Output, E::Output> + 'static,
    {
        let dispatch = Box::new(TypedDispatch::new(success, error, callback));
        self.queue.push(QueuedRequest::new(request, handler, dispatch));
        self
    }

    /// Number of requests waiting for the next execution.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The pending requests, in send order.
    pub fn requests(&self) -> &[QueuedRequest] {
        self.queue.as_slice()
    }

    pub fn client(&self) -> &BatchClient<T> {
        &self.client
    }

    /// Build the outer request the next round would send.
    ///
    /// The request is a POST to the batch URL carrying the client's default
    /// headers and a `multipart/mixed` body with one part per pending request.
    pub fn build_request(&self) -> Result<Request<Bytes>, BatchError> {
        outer_request(&self.client, self.queue.as_slice())
    }

    /// Send the pending requests once and return the raw batch reply.
    ///
    /// Nothing is decoded or dispatched, no handler runs, and the queue is
    /// left untouched.
    pub fn execute_unparsed(
        &self,
    ) -> impl Future<Output = Result<Response<Bytes>, BatchError>> + Send + '_ {
        let request = self.build_request();
        let client = &self.client;
        async move { client.send(request?).await }
    }

    /// Send every pending request and dispatch every response.
    ///
    /// Returns once every request has reached a final outcome. On a fatal
    /// error, requests already finalized keep their outcome, and the rest stay
    /// queued without their callbacks being invoked. Dropping the returned
    /// future mid-round leaves the queue in the same state.
    ///
    /// # Errors
    ///
    /// - [`BatchError::EmptyBatch`] if nothing is queued
    /// - [`BatchError::RetryLimitExceeded`] if handlers still ask for retries
    ///   after the last round the policy permits
    /// - any transport, status, or framing error of the outer exchange
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "batch.execute",
            skip_all,
            fields(
                batch.url = %self.client.batch_url(),
                batch.size = self.queue.len(),
                otel.kind = "client",
            )
        )
    )]
    pub async fn execute(&mut self) -> Result<BatchSummary, BatchError> {
        if self.queue.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let mut backoff = self.client.retry_policy().backoff();
        let mut summary = BatchSummary::default();

        loop {
            summary.rounds += 1;
            self.execute_round(summary.rounds, backoff.can_retry(), &mut summary)
                .await?;

            if self.queue.is_empty() {
                return Ok(summary);
            }
            let Some(delay) = backoff.next() else {
                return Err(BatchError::RetryLimitExceeded {
                    rounds: summary.rounds,
                    pending: self.queue.len(),
                });
            };
            #[cfg(feature = "tracing")]
            tracing::debug!(
                round = summary.rounds,
                pending = self.queue.len(),
                delay_ms = delay.as_millis() as u64,
                "retrying batch requests"
            );
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn execute_round(
        &mut self,
        round: u32,
        supports_retry: bool,
        summary: &mut BatchSummary,
    ) -> Result<(), BatchError> {
        #[cfg(feature = "tracing")]
        tracing::debug!(round, requests = self.queue.len(), "sending batch round");

        // The queue stays intact until the reply is split, so a failed or
        // cancelled round leaves every request pending.
        let request = outer_request(&self.client, self.queue.as_slice())?;
        let parts = exchange(&self.client, request, self.queue.len()).await?;
        let items = self.queue.drain();

        for (item, part) in items.into_iter().zip(parts) {
            let QueuedRequest {
                mut request,
                handler,
                dispatch,
            } = item;

            let retry = match &handler {
                Some(handler) if !part.is_success() => {
                    let response = part.to_response();
                    let mut ctx = UnsuccessfulResponseContext {
                        request: &mut request,
                        response: &response,
                        supports_retry,
                        round,
                    };
                    handler.handle_response(&mut ctx)
                }
                _ => false,
            };

            if retry {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    round,
                    content_id = part.content_id,
                    status = part.status.as_u16(),
                    "handler requested retry"
                );
                self.queue
                    .push(QueuedRequest::new(request, handler, dispatch));
                continue;
            }

            match dispatch.dispatch(&part) {
                Outcome::Succeeded => summary.succeeded += 1,
                Outcome::Failed => summary.failed += 1,
            }
        }

        Ok(())
    }
}

fn outer_request<T>(
    client: &BatchClient<T>,
    items: &[QueuedRequest],
) -> Result<Request<Bytes>, BatchError>
where
    T: Transport,
{
    let config = client.config();
    let encoded = encode_with_boundary(
        items.iter().map(QueuedRequest::request),
        config.boundary.clone(),
    )?;
    let content_type = HeaderValue::try_from(encoded.content_type)
        .map_err(|e| BatchError::Build(format!("invalid content type: {}", e)))?;

    let mut request = Request::new(encoded.body);
    *request.method_mut() = Method::POST;
    *request.uri_mut() = config.batch_url.clone();
    *request.headers_mut() = config.default_headers.clone();
    request.headers_mut().insert(CONTENT_TYPE, content_type);
    Ok(request)
}

/// Send one outer request and split its reply into exactly `expected` parts.
async fn exchange<T: Transport>(
    client: &BatchClient<T>,
    request: Request<Bytes>,
    expected: usize,
) -> Result<Vec<MultipartPart>, BatchError> {
    let response = client.send(request).await?;

    let status = response.status();
    if !status.is_success() {
        return Err(BatchError::UnexpectedStatus { status });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            BatchError::MalformedMultipart("batch response has no content type".into())
        })?;
    let boundary = boundary_from_content_type(content_type)?;

    let parts = decode(response.body(), &boundary)?;
    if parts.len() != expected {
        return Err(BatchError::PartCountMismatch {
            expected,
            actual: parts.len(),
        });
    }
    Ok(parts)
}
