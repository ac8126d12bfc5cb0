//! Per-request result callbacks.

use std::fmt;

use http::{HeaderMap, StatusCode};

use crate::BatchError;

/// Receives the final outcome of one queued request.
///
/// Exactly one of the two methods is invoked, exactly once, for every request
/// that reaches a final outcome. Requests still pending when execution aborts
/// with a fatal error are not notified; they stay queued.
pub trait BatchCallback<T, E>: Send {
    /// Called with the decoded body of a 2xx part.
    fn on_success(&mut self, value: T, headers: &HeaderMap);

    /// Called for a non-2xx part, or for any part whose body failed to decode.
    fn on_failure(&mut self, failure: Failure<E>, headers: &HeaderMap);
}

/// Why a request failed.
#[derive(Debug)]
pub enum Failure<E> {
    /// The part carried a non-2xx status; `error` is the decoded error body.
    Status { status: StatusCode, error: E },
    /// The part body could not be decoded into the expected shape.
    Decode { status: StatusCode, error: BatchError },
}

impl<E> Failure<E> {
    /// Status of the response part.
    pub fn status(&self) -> StatusCode {
        match self {
            Failure::Status { status, .. } | Failure::Decode { status, .. } => *status,
        }
    }

    /// The decoded error body, if the failure came from a non-2xx status.
    pub fn error(&self) -> Option<&E> {
        match self {
            Failure::Status { error, .. } => Some(error),
            Failure::Decode { .. } => None,
        }
    }

    pub fn into_error(self) -> Option<E> {
        match self {
            Failure::Status { error, .. } => Some(error),
            Failure::Decode { .. } => None,
        }
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Failure::Decode { .. })
    }
}

impl<E: fmt::Debug> fmt::Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Status { status, error } => write!(f, "{status}: {error:?}"),
            Failure::Decode { status, error } => write!(f, "{status}: {error}"),
        }
    }
}

/// A callback built from two closures.
///
/// See [`callback_fn`].
pub struct FnCallback<S, F> {
    on_success: S,
    on_failure: F,
}

/// Build a [`BatchCallback`] from a success closure and a failure closure.
///
/// ```ignore
/// batch.queue_json::<Egg, GoogleJsonErrorContainer, _>(
///     request,
///     callback_fn(
///         |egg: Egg, _headers: &HeaderMap| println!("{}", egg.id),
///         |failure, _headers: &HeaderMap| eprintln!("{failure}"),
///     ),
/// );
/// ```
pub fn callback_fn<T, E, S, F>(on_success: S, on_failure: F) -> FnCallback<S, F>
where
    S: FnMut(T, &HeaderMap) + Send,
    F: FnMut(Failure<E>, &HeaderMap) + Send,
{
    FnCallback {
        on_success,
        on_failure,
    }
}

impl<T, E, S, F> BatchCallback<T, E> for FnCallback<S, F>
where
    S: FnMut(T, &HeaderMap) + Send,
    F: FnMut(Failure<E>, &HeaderMap) + Send,
{
    fn on_success(&mut self, value: T, headers: &HeaderMap) {
        (self.on_success)(value, headers)
    }

    fn on_failure(&mut self, failure: Failure<E>, headers: &HeaderMap) {
        (self.on_failure)(failure, headers)
    }
}

impl<S, F> fmt::Debug for FnCallback<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCallback").finish_non_exhaustive()
    }
}
