//! Batched HTTP requests over `multipart/mixed`.
//!
//! This crate sends many independent HTTP requests to a batch endpoint as a
//! single POST, then routes each part of the reply to the callback of the
//! request it answers.
//!
//! ## Features
//!
//! - Heterogeneous queues: every request has its own result shapes and callback
//! - Exactly one callback invocation per finalized request
//! - Per-request unsuccessful-response handlers that can rewrite and retry
//! - Capped follow-up rounds with optional backoff
//! - hyper-based transport with rustls, or any custom [`Transport`]
//!
//! ## Example
//!
//! ```ignore
//! use http::HeaderMap;
//! use http_batch_client::{BatchClient, Failure, GoogleJsonErrorContainer, callback_fn};
//!
//! let client = BatchClient::builder("https://www.googleapis.com/batch").build()?;
//! let mut batch = client.batch();
//!
//! batch.queue_google_json::<Egg, _>(
//!     http::Request::get("https://www.googleapis.com/eggs/1").body(Bytes::new())?,
//!     callback_fn(
//!         |egg: Egg, _: &HeaderMap| println!("got {}", egg.id),
//!         |failure: Failure<GoogleJsonErrorContainer>, _: &HeaderMap| eprintln!("{failure}"),
//!     ),
//! );
//!
//! let summary = batch.execute().await?;
//! println!("{} rounds, {} ok, {} failed", summary.rounds, summary.succeeded, summary.failed);
//! ```
//!
//! ## Feature Flags
//!
//! - `tls` (default): rustls with ring and the platform's root certificates
//! - `tracing` (default): spans and events for batch execution

mod batch;
mod builder;
mod callback;
mod client;
pub mod config;
mod error;
mod handler;
mod json_error;
mod queue;
mod shape;
pub mod transport;

pub use batch::{Batch, BatchSummary};
pub use builder::{BatchClientBuilder, ClientBuildError};
pub use callback::{BatchCallback, Failure, FnCallback, callback_fn};
pub use client::BatchClient;
pub use error::BatchError;
pub use handler::{UnsuccessfulResponseContext, UnsuccessfulResponseHandler};
pub use json_error::{ErrorInfo, GoogleJsonError, GoogleJsonErrorContainer, JsonErrorShape};
pub use queue::QueuedRequest;
pub use shape::{Json, NoContent, Raw, Shape};

// Re-export from config module
pub use config::{BatchConfig, ExponentialBackoff, RetryPolicy};

// Re-export transport types at the top level for convenience
pub use transport::{HyperTransport, HyperTransportBuilder, TlsClientConfig, Transport, TransportBody};

// Re-export core types that users need
pub use http_batch_core::{Boundary, DEFAULT_BOUNDARY, MultipartError, MultipartPart};

pub use bytes::Bytes;
