//! Sending outer batch requests.
//!
//! A batch round is a single buffered exchange: the whole multipart body is
//! sent, and the whole multipart reply is read before decoding. [`Transport`]
//! captures exactly that, so tests (and callers with their own HTTP stack)
//! can substitute any implementation.
//!
//! [`HyperTransport`] is the default: a pooled hyper client speaking HTTP/1.1
//! or HTTP/2, with rustls when a `tls-*` feature is enabled, that also works
//! as a `tower_service::Service`.
//!
//! # Feature Flags
//!
//! - `tls` (default) - Enables `tls-ring` + `tls-native-roots` for convenience
//! - `tls-ring` / `tls-aws-lc` - Crypto providers
//! - `tls-native-roots` / `tls-webpki-roots` - Root certificates
//!
//! # Example
//!
//! ```ignore
//! use http_batch_client::transport::HyperTransport;
//! use std::time::Duration;
//!
//! let transport = HyperTransport::builder()
//!     .idle_timeout(Some(Duration::from_secs(60)))
//!     .build()?;
//! let client = BatchClient::builder(url).transport(transport.clone()).build()?;
//! ```

mod body;
mod connector;
mod hyper;

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response};

use crate::BatchError;

pub use body::TransportBody;
pub use connector::{build_https_connector, has_tls_support};

#[cfg(any(feature = "tls-native-roots", feature = "tls-webpki-roots"))]
pub use connector::default_tls_config;

pub use hyper::{DEFAULT_MAX_RESPONSE_SIZE, HyperTransport, HyperTransportBuilder};

pub use rustls::ClientConfig as TlsClientConfig;

/// Sends one fully buffered HTTP request and returns the fully buffered
/// response.
///
/// Implementations report connection-level failures as
/// [`BatchError::Transport`]. Non-2xx statuses are not errors at this layer.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, BatchError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>, BatchError>> + Send {
        (**self).send(request)
    }
}
