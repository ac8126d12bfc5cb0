//! Default transport over hyper.
//!
//! [`HyperTransport`] sends each outer batch request on a pooled
//! `hyper_util` client and buffers the whole multipart reply: no part can be
//! dispatched before the closing delimiter has arrived, so there is nothing to
//! gain from streaming it.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use rustls::ClientConfig;
use tower_service::Service;

use super::Transport;
use super::body::TransportBody;
use super::connector::build_https_connector;
use crate::BatchError;
use crate::builder::ClientBuildError;

/// Largest batch reply buffered by default (64 MiB).
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

type PooledClient = Client<HttpsConnector<HttpConnector>, TransportBody>;

/// Pooled HTTP/1.1 + HTTP/2 transport with rustls.
///
/// Clones share the connection pool, so one transport can serve every
/// [`BatchClient`](crate::BatchClient) talking to the same endpoints.
#[derive(Clone)]
pub struct HyperTransport {
    client: PooledClient,
    max_response_size: Option<usize>,
    http2_only: bool,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("max_response_size", &self.max_response_size)
            .field("http2_only", &self.http2_only)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::new()
    }

    /// A transport with the default pool, TLS and size settings.
    pub fn new() -> Result<Self, ClientBuildError> {
        HyperTransportBuilder::new().build()
    }

    /// Upper bound on a buffered batch reply, if any.
    pub fn max_response_size(&self) -> Option<usize> {
        self.max_response_size
    }

    pub fn is_http2_only(&self) -> bool {
        self.http2_only
    }
}

impl Transport for HyperTransport {
    fn send(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, BatchError>> + Send {
        roundtrip(self.client.clone(), self.max_response_size, request)
    }
}

async fn roundtrip(
    client: PooledClient,
    max_response_size: Option<usize>,
    request: Request<Bytes>,
) -> Result<Response<Bytes>, BatchError> {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        uri = %request.uri(),
        bytes = request.body().len(),
        "sending batch request"
    );

    let response = client
        .request(request.map(TransportBody::full))
        .await
        .map_err(|e| BatchError::Transport(e.to_string()))?;
    let (head, body) = response.into_parts();

    let body = match max_response_size {
        Some(limit) => Limited::new(body, limit)
            .collect()
            .await
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    BatchError::Transport(format!("batch response exceeds {limit} bytes"))
                } else {
                    BatchError::Transport(format!("reading batch response: {e}"))
                }
            })?
            .to_bytes(),
        None => body
            .collect()
            .await
            .map_err(|e| BatchError::Transport(format!("reading batch response: {e}")))?
            .to_bytes(),
    };

    Ok(Response::from_parts(head, body))
}

/// Builder for [`HyperTransport`].
///
/// ```ignore
/// use http_batch_client::HyperTransport;
/// use std::time::Duration;
///
/// let transport = HyperTransport::builder()
///     .idle_timeout(Some(Duration::from_secs(30)))
///     .max_response_size(Some(8 * 1024 * 1024))
///     .build()?;
/// ```
#[derive(Debug)]
pub struct HyperTransportBuilder {
    tls_config: Option<ClientConfig>,
    http2_only: bool,
    idle_timeout: Option<Duration>,
    max_idle_per_host: usize,
    max_response_size: Option<usize>,
}

impl Default for HyperTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransportBuilder {
    pub fn new() -> Self {
        Self {
            tls_config: None,
            http2_only: false,
            idle_timeout: Some(Duration::from_secs(90)),
            max_idle_per_host: 8,
            max_response_size: Some(DEFAULT_MAX_RESPONSE_SIZE),
        }
    }

    /// Use this rustls configuration instead of the feature-selected default
    /// (custom roots, client certificates).
    pub fn tls_config(mut self, config: ClientConfig) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Speak HTTP/2 with prior knowledge. Only matters for cleartext
    /// endpoints; over TLS the version is negotiated through ALPN.
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.http2_only = enabled;
        self
    }

    /// How long an idle pooled connection is kept. `None` keeps it until the
    /// server closes it. Default: 90 seconds.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Idle connections kept per host. Batches funnel many requests into one
    /// connection, so few are needed. Default: 8.
    pub fn max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Reject batch replies larger than this many bytes. `None` lifts the
    /// limit. Default: [`DEFAULT_MAX_RESPONSE_SIZE`].
    pub fn max_response_size(mut self, limit: Option<usize>) -> Self {
        self.max_response_size = limit;
        self
    }

    pub fn build(self) -> Result<HyperTransport, ClientBuildError> {
        let connector = build_https_connector(self.tls_config)?;

        let mut pool = Client::builder(TokioExecutor::new());
        // idle_timeout needs a timer to fire
        pool.pool_timer(TokioTimer::new())
            .pool_idle_timeout(self.idle_timeout)
            .pool_max_idle_per_host(self.max_idle_per_host)
            .http2_only(self.http2_only);

        Ok(HyperTransport {
            client: pool.build(connector),
            max_response_size: self.max_response_size,
            http2_only: self.http2_only,
        })
    }
}

impl Service<Request<Bytes>> for HyperTransport {
    type Response = Response<Bytes>;
    type Error = BatchError;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Bytes>, BatchError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), BatchError>> {
        // The pool opens connections on demand.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        Box::pin(roundtrip(
            self.client.clone(),
            self.max_response_size,
            request,
        ))
    }
}
