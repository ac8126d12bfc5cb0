//! Batch execution error types.
//!
//! This module provides [`BatchError`], the error type returned by batch
//! execution and by response shapes that fail to decode a part body.

use std::time::Duration;

use http::StatusCode;
use http_batch_core::MultipartError;

/// Batch execution error variants.
///
/// Only [`BatchError::Decode`] is reported per request (through the
/// request's callback). Every other variant aborts the whole execution and is
/// returned from [`Batch::execute`](crate::Batch::execute).
#[derive(Clone, Debug, thiserror::Error)]
pub enum BatchError {
    /// Execution was attempted with zero queued requests.
    #[error("batch contains no requests")]
    EmptyBatch,

    /// The batch reply could not be split into parts.
    #[error("malformed multipart response: {0}")]
    MalformedMultipart(String),

    /// The batch reply carried a different number of parts than was sent.
    #[error("response part count mismatch: sent {expected} requests, received {actual} parts")]
    PartCountMismatch { expected: usize, actual: usize },

    /// Transport-level error (connection failed, reset, etc.).
    #[error("transport error: {0}")]
    Transport(String),

    /// A round did not complete within the configured timeout.
    #[error("batch round timed out after {0:?}")]
    Timeout(Duration),

    /// The batch endpoint itself answered with a non-2xx status.
    #[error("batch endpoint returned {status}")]
    UnexpectedStatus { status: StatusCode },

    /// A part body could not be decoded into its expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// Requests still asked to be retried after the last permitted round.
    #[error("retry limit exceeded: {pending} requests still pending after {rounds} rounds")]
    RetryLimitExceeded { rounds: u32, pending: usize },

    /// The outer batch request could not be assembled.
    #[error("failed to build batch request: {0}")]
    Build(String),
}

impl BatchError {
    /// Whether this error aborts the batch rather than a single request.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BatchError::Decode(_))
    }
}

impl From<MultipartError> for BatchError {
    fn from(err: MultipartError) -> Self {
        match err {
            MultipartError::EmptyBatch => BatchError::EmptyBatch,
            MultipartError::BoundaryCollision { .. } | MultipartError::InvalidBoundary(_) => {
                BatchError::Build(err.to_string())
            }
            MultipartError::MissingBoundary(_)
            | MultipartError::Unterminated(_)
            | MultipartError::MalformedMessage(_)
            | MultipartError::MalformedPart { .. } => {
                BatchError::MalformedMultipart(err.to_string())
            }
        }
    }
}
