//! Batch client.
//!
//! This module provides [`BatchClient`], the long-lived handle from which
//! individual [`Batch`]es are created.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Request, Response, Uri};

use crate::BatchError;
use crate::batch::Batch;
use crate::builder::BatchClientBuilder;
use crate::config::{BatchConfig, RetryPolicy};
use crate::transport::{HyperTransport, Transport};

/// Client for a batch endpoint.
///
/// The client is generic over `T`: the [`Transport`] used to send outer
/// batch requests. This defaults to [`HyperTransport`].
///
/// Cloning is cheap; clones share the configuration and, for
/// [`HyperTransport`], the connection pool.
///
/// # Example
///
/// ```ignore
/// use http_batch_client::{BatchClient, callback_fn};
///
/// let client = BatchClient::builder("https://www.googleapis.com/batch").build()?;
///
/// let mut batch = client.batch();
/// batch.queue_json::<Egg, GoogleJsonErrorContainer, _>(request, callback);
/// let summary = batch.execute().await?;
/// ```
#[derive(Debug, Clone)]
pub struct BatchClient<T = HyperTransport> {
    /// HTTP transport.
    transport: T,
    /// Settings shared by every batch.
    config: Arc<BatchConfig>,
}

impl BatchClient<HyperTransport> {
    /// Create a new BatchClientBuilder for the given batch endpoint.
    ///
    /// This is a convenience method equivalent to `BatchClientBuilder::new(batch_url)`.
    pub fn builder<S: Into<String>>(batch_url: S) -> BatchClientBuilder {
        BatchClientBuilder::new(batch_url)
    }
}

impl<T: Transport> BatchClient<T> {
    /// Create a client from a transport and a resolved configuration.
    ///
    /// Prefer [`BatchClientBuilder`], which validates the configuration.
    pub fn new(transport: T, config: BatchConfig) -> Self {
        Self {
            transport,
            config: Arc::new(config),
        }
    }

    /// Start a new, empty batch.
    pub fn batch(&self) -> Batch<T>
    where
        T: Clone,
    {
        Batch::new(self.clone())
    }

    /// The batch endpoint.
    pub fn batch_url(&self) -> &Uri {
        &self.config.batch_url
    }

    /// The per-round timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.config.timeout
    }

    /// The follow-up round policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.config.retry_policy
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one outer request, bounded by the per-round timeout.
    pub(crate) async fn send(&self, request: Request<Bytes>) -> Result<Response<Bytes>, BatchError> {
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.transport.send(request))
                .await
                .map_err(|_| BatchError::Timeout(limit))?,
            None => self.transport.send(request).await,
        }
    }
}
