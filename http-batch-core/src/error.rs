//! Batch framing errors.
//!
//! This module provides [`MultipartError`], returned by every encode and
//! decode operation in this crate.

/// Multipart framing errors.
///
/// Every variant except [`MultipartError::EmptyBatch`] describes a response
/// body (or header) that cannot be trusted as a whole; callers abort the
/// round rather than dispatching any of its parts.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MultipartError {
    /// Encoding was attempted with zero requests.
    #[error("batch contains no requests")]
    EmptyBatch,

    /// The `Content-Type` header has no usable `boundary` parameter.
    #[error("missing multipart boundary: {0}")]
    MissingBoundary(String),

    /// The boundary token violates RFC 2046 (length or characters).
    #[error("invalid multipart boundary {0:?}")]
    InvalidBoundary(String),

    /// No closing `--boundary--` delimiter was found.
    #[error("unterminated multipart body: no closing delimiter for boundary {0:?}")]
    Unterminated(String),

    /// An inner HTTP message could not be parsed.
    #[error("malformed HTTP message: {0}")]
    MalformedMessage(String),

    /// A part could not be parsed as part headers plus an inner HTTP message.
    #[error("malformed part {index}: {reason}")]
    MalformedPart { index: usize, reason: String },

    /// Every candidate boundary occurred inside a serialized request.
    #[error("could not choose a boundary that does not occur in the batch after {attempts} attempts")]
    BoundaryCollision { attempts: usize },
}

impl MultipartError {
    pub(crate) fn malformed<S: Into<String>>(index: usize, reason: S) -> Self {
        MultipartError::MalformedPart {
            index,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_error_display() {
        assert_eq!(
            MultipartError::EmptyBatch.to_string(),
            "batch contains no requests"
        );

        let err = MultipartError::malformed(2, "missing status line");
        assert_eq!(err.to_string(), "malformed part 2: missing status line");

        let err = MultipartError::Unterminated("ABCDEF".into());
        assert_eq!(
            err.to_string(),
            "unterminated multipart body: no closing delimiter for boundary \"ABCDEF\""
        );
    }
}
