//! Unsuccessful-response handlers.
//!
//! A handler attached to a queued request sees every non-2xx part for that
//! request before its callback does. Returning `true` asks for the request to
//! be sent again in the next round; the handler may rewrite the request first
//! (refresh an `Authorization` header, for example). Returning `false`
//! finalizes the request and its callback receives the failure.

use bytes::Bytes;
use http::{Request, Response};

/// Context passed to [`UnsuccessfulResponseHandler::handle_response`].
#[derive(Debug)]
pub struct UnsuccessfulResponseContext<'a> {
    /// The request as it will be re-sent if the handler asks for a retry.
    pub request: &'a mut Request<Bytes>,
    /// The unsuccessful response part.
    pub response: &'a Response<Bytes>,
    /// Whether another round is still permitted by the retry policy.
    ///
    /// Asking for a retry when this is `false` aborts the batch with
    /// [`BatchError::RetryLimitExceeded`](crate::BatchError::RetryLimitExceeded).
    pub supports_retry: bool,
    /// 1-based round in which the response was received.
    pub round: u32,
}

/// Decides whether a request with a non-2xx response is retried.
///
/// Implemented for any `Fn(&mut UnsuccessfulResponseContext<'_>) -> bool`.
pub trait UnsuccessfulResponseHandler: Send + Sync {
    /// Return `true` to re-send the request in the next round.
    fn handle_response(&self, ctx: &mut UnsuccessfulResponseContext<'_>) -> bool;
}

impl<F> UnsuccessfulResponseHandler for F
where
    F: Fn(&mut UnsuccessfulResponseContext<'_>) -> bool + Send + Sync,
{
    fn handle_response(&self, ctx: &mut UnsuccessfulResponseContext<'_>) -> bool {
        self(ctx)
    }
}
