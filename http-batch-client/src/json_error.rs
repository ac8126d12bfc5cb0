//! Google-style JSON error bodies.
//!
//! Batch endpoints in the Google API family answer failed parts with a body
//! of the form:
//!
//! ```json
//! {
//!   "error": {
//!     "errors": [{"domain": "global", "reason": "notFound", "message": "Error message"}],
//!     "code": 404,
//!     "message": "Error message"
//!   }
//! }
//! ```
//!
//! Use [`JsonErrorShape`] (or `Json<GoogleJsonErrorContainer>`) as the error
//! shape of a queued request to receive it decoded.

use serde::{Deserialize, Serialize};

use crate::shape::Json;

/// Top-level error envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleJsonErrorContainer {
    pub error: GoogleJsonError,
}

/// The error carried by a failed response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleJsonError {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorInfo>,
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

/// One detailed error entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_type: Option<String>,
}

impl GoogleJsonError {
    /// The `reason` of the first detailed error, if any.
    pub fn reason(&self) -> Option<&str> {
        self.errors.first().map(|info| info.reason.as_str())
    }
}

/// Error shape decoding [`GoogleJsonErrorContainer`].
pub type JsonErrorShape = Json<GoogleJsonErrorContainer>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use bytes::Bytes;

    const NOT_FOUND: &str = r#"{"error": { "errors": [{"domain": "global","reason": "notFound", "message": "Error message"}],"code": 404, "message": "Error message"}}"#;

    #[test]
    fn test_decode_not_found() {
        let container = JsonErrorShape::new()
            .decode(&Bytes::from_static(NOT_FOUND.as_bytes()))
            .unwrap();

        assert_eq!(container.error.code, 404);
        assert_eq!(container.error.message, "Error message");
        assert_eq!(container.error.reason(), Some("notFound"));
        assert_eq!(container.error.errors[0].domain, "global");
        assert_eq!(container.error.errors[0].location, None);
    }

    #[test]
    fn test_decode_location_type() {
        let body = r#"{"error": {"errors": [{"domain": "global", "reason": "required", "message": "Login Required", "locationType": "header", "location": "Authorization"}], "code": 401, "message": "Login Required"}}"#;
        let container = JsonErrorShape::new()
            .decode(&Bytes::from(body))
            .unwrap();

        let info = &container.error.errors[0];
        assert_eq!(info.location_type.as_deref(), Some("header"));
        assert_eq!(info.location.as_deref(), Some("Authorization"));
    }

    #[test]
    fn test_decode_minimal_error() {
        let container = JsonErrorShape::new()
            .decode(&Bytes::from_static(br#"{"error": {"code": 500}}"#))
            .unwrap();
        assert_eq!(container.error.code, 500);
        assert!(container.error.errors.is_empty());
        assert_eq!(container.error.reason(), None);
    }
}
