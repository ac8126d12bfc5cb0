//! Client builder for the batch client.
//!
//! Provides a fluent API for configuring and building a [`BatchClient`].

use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Uri};
use http_batch_core::{Boundary, MultipartError};

use crate::client::BatchClient;
use crate::config::{BatchConfig, RetryPolicy};
use crate::transport::{HyperTransport, Transport};

/// Builder for creating a [`BatchClient`].
///
/// # Example
///
/// ```ignore
/// use http_batch_client::{BatchClientBuilder, RetryPolicy};
/// use std::time::Duration;
///
/// let client = BatchClientBuilder::new("https://www.googleapis.com/batch")
///     .default_header("user-agent", "my-app/1.0")
///     .timeout(Duration::from_secs(30))
///     .retry_policy(RetryPolicy::immediate(2))
///     .build()?;
/// ```
pub struct BatchClientBuilder {
    /// The batch endpoint (e.g., "https://www.googleapis.com/batch").
    batch_url: String,
    /// Headers added to every outer batch request.
    default_headers: Vec<(String, String)>,
    /// Per-round timeout.
    timeout: Option<Duration>,
    /// Cap and pacing of follow-up rounds.
    retry_policy: RetryPolicy,
    /// Preferred boundary token.
    boundary: Option<String>,
    /// Optional pre-configured transport.
    transport: Option<HyperTransport>,
    /// Use HTTP/2 prior knowledge when the builder creates the transport.
    http2_only: bool,
}

impl std::fmt::Debug for BatchClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchClientBuilder")
            .field("batch_url", &self.batch_url)
            .field("default_headers", &self.default_headers.len())
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .field("boundary", &self.boundary)
            .field("transport", &self.transport.is_some())
            .field("http2_only", &self.http2_only)
            .finish()
    }
}

impl BatchClientBuilder {
    /// Create a new builder for the given batch endpoint.
    ///
    /// The URL must be absolute, including the scheme and host.
    pub fn new<S: Into<String>>(batch_url: S) -> Self {
        Self {
            batch_url: batch_url.into(),
            default_headers: Vec::new(),
            timeout: None,
            retry_policy: RetryPolicy::default(),
            boundary: None,
            transport: None,
            http2_only: false,
        }
    }

    /// Use a pre-configured [`HyperTransport`].
    ///
    /// The transport's connection pool is shared with every clone of it.
    pub fn transport(mut self, transport: HyperTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Add a header to every outer batch request.
    ///
    /// Headers of the individual requests are carried inside their parts and
    /// are not affected. `Content-Type` is always set by the executor.
    pub fn default_header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Set the per-round timeout.
    ///
    /// The timeout covers sending one outer batch request and reading its
    /// whole reply. Each follow-up round gets a fresh timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the follow-up round policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the preferred multipart boundary.
    ///
    /// A random boundary is used instead for any batch whose content contains
    /// it. Default: `__END_OF_PART__`.
    pub fn boundary<S: Into<String>>(mut self, boundary: S) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Use HTTP/2 prior knowledge for cleartext endpoints.
    ///
    /// Only applies when the builder creates the transport.
    pub fn http2_only(mut self) -> Self {
        self.http2_only = true;
        self
    }

    /// Build the client with a [`HyperTransport`].
    pub fn build(self) -> Result<BatchClient<HyperTransport>, ClientBuildError> {
        let config = self.config()?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => HyperTransport::builder()
                .http2_only(self.http2_only)
                .build()?,
        };
        Ok(BatchClient::new(transport, config))
    }

    /// Build the client over a custom [`Transport`].
    pub fn build_with_transport<T: Transport>(
        self,
        transport: T,
    ) -> Result<BatchClient<T>, ClientBuildError> {
        let config = self.config()?;
        Ok(BatchClient::new(transport, config))
    }

    fn config(&self) -> Result<BatchConfig, ClientBuildError> {
        let batch_url = parse_batch_url(&self.batch_url)?;

        let mut default_headers = HeaderMap::with_capacity(self.default_headers.len());
        for (name, value) in &self.default_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ClientBuildError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|e| ClientBuildError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            default_headers.append(header_name, header_value);
        }

        self.retry_policy
            .validate()
            .map_err(ClientBuildError::InvalidRetryPolicy)?;

        let boundary = match &self.boundary {
            Some(token) => Boundary::new(token.as_str())?,
            None => Boundary::default(),
        };

        Ok(BatchConfig {
            batch_url,
            default_headers,
            timeout: self.timeout,
            retry_policy: self.retry_policy.clone(),
            boundary,
        })
    }
}

fn parse_batch_url(url: &str) -> Result<Uri, ClientBuildError> {
    let invalid = |reason: &str| ClientBuildError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    let uri: Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
    match uri.scheme_str() {
        Some("http") | Some("https") => {}
        Some(_) => return Err(invalid("scheme must be http or https")),
        None => return Err(invalid("URL must be absolute")),
    }
    if uri.authority().is_none() {
        return Err(invalid("URL has no host"));
    }
    Ok(uri)
}

/// Error type for client building.
#[derive(Debug, thiserror::Error)]
pub enum ClientBuildError {
    /// The batch URL is not an absolute http(s) URL.
    #[error("invalid batch URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A default header has an invalid name or value.
    #[error("invalid default header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The preferred boundary is not a valid RFC 2046 token.
    #[error("invalid boundary: {0}")]
    InvalidBoundary(#[from] MultipartError),

    /// The retry policy failed validation.
    #[error("invalid retry policy: {0}")]
    InvalidRetryPolicy(&'static str),

    /// Failed to create the HTTP transport.
    #[error("failed to create HTTP transport: {0}")]
    Transport(String),
}
