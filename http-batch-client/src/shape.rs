//! Response shapes.
//!
//! A [`Shape`] turns the body of one response part into a typed value. Each
//! queued request carries two shapes: one applied to 2xx parts and one applied
//! to every other status.

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::BatchError;

/// Decoder for the body of a response part.
pub trait Shape: Send + 'static {
    /// The decoded value handed to the callback.
    type Output;

    /// Decode a part body.
    ///
    /// Errors are reported to the request's callback as
    /// [`Failure::Decode`](crate::Failure::Decode); they never abort the batch.
    fn decode(&self, body: &Bytes) -> Result<Self::Output, BatchError>;

    /// Human-readable name of the decoded type, used in diagnostics.
    fn name(&self) -> &'static str {
        type_name::<Self::Output>()
    }
}

/// Decode the part body as JSON into `T`.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    pub fn new() -> Self {
        Json(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Json<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Json<T> {}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Json<{}>", type_name::<T>())
    }
}

impl<T> Shape for Json<T>
where
    T: DeserializeOwned + 'static,
{
    type Output = T;

    fn decode(&self, body: &Bytes) -> Result<T, BatchError> {
        serde_json::from_slice(body).map_err(|e| {
            BatchError::Decode(format!("failed to decode {} from JSON: {}", type_name::<T>(), e))
        })
    }
}

/// A response with no meaningful body.
///
/// The body is never inspected, so an empty or non-JSON body still decodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoContent;

impl Shape for NoContent {
    type Output = ();

    fn decode(&self, _body: &Bytes) -> Result<(), BatchError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "()"
    }
}

/// The raw part body, without decoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct Raw;

impl Shape for Raw {
    type Output = Bytes;

    fn decode(&self, body: &Bytes) -> Result<Bytes, BatchError> {
        Ok(body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Egg {
        id: String,
        kind: String,
    }

    #[test]
    fn test_json_decode() {
        let body = Bytes::from_static(br#"{"id": "Humpty Dumpty", "kind": "Big Egg"}"#);
        let egg = Json::<Egg>::new().decode(&body).unwrap();
        assert_eq!(
            egg,
            Egg {
                id: "Humpty Dumpty".into(),
                kind: "Big Egg".into(),
            }
        );
    }

    #[test]
    fn test_json_decode_error() {
        let err = Json::<Egg>::new()
            .decode(&Bytes::from_static(b"not json"))
            .unwrap_err();
        assert!(matches!(err, BatchError::Decode(_)));
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Egg"));
    }

    #[test]
    fn test_no_content_ignores_body() {
        assert!(NoContent.decode(&Bytes::new()).is_ok());
        assert!(NoContent.decode(&Bytes::from_static(b"<html>")).is_ok());
        assert_eq!(NoContent.name(), "()");
    }

    #[test]
    fn test_raw_passthrough() {
        let body = Bytes::from_static(b"\x00\x01binary");
        assert_eq!(Raw.decode(&body).unwrap(), body);
    }

    #[test]
    fn test_shape_name() {
        assert!(Json::<Egg>::new().name().ends_with("Egg"));
        assert!(Raw.name().ends_with("Bytes"));
    }
}
