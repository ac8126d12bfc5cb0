//! Multipart boundary tokens.
//!
//! The batch wire format historically uses the fixed sentinel
//! [`DEFAULT_BOUNDARY`]. A fixed token is only safe when no serialized inner
//! request contains it, so [`Boundary::choose`] scans the parts first and
//! falls back to random tokens on collision.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;

use crate::error::MultipartError;

/// The boundary sentinel used when it does not collide with request content.
pub const DEFAULT_BOUNDARY: &str = "__END_OF_PART__";

/// Maximum boundary length allowed by RFC 2046.
pub const MAX_BOUNDARY_LEN: usize = 70;

/// Length of the random part of a generated boundary.
const RANDOM_BOUNDARY_LEN: usize = 32;

/// Number of random tokens tried before giving up.
const MAX_CHOOSE_ATTEMPTS: usize = 8;

/// A validated multipart boundary token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Boundary(String);

impl Boundary {
    /// Validate and wrap a boundary token.
    pub fn new<S: Into<String>>(token: S) -> Result<Self, MultipartError> {
        let token = token.into();
        if token.is_empty()
            || token.len() > MAX_BOUNDARY_LEN
            || token.ends_with(' ')
            || !token.bytes().all(is_bchar)
        {
            return Err(MultipartError::InvalidBoundary(token));
        }
        Ok(Boundary(token))
    }

    /// The fixed sentinel boundary.
    pub fn default_sentinel() -> Self {
        Boundary(DEFAULT_BOUNDARY.to_string())
    }

    /// A fresh random boundary.
    pub fn random() -> Self {
        let suffix: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_BOUNDARY_LEN)
            .map(char::from)
            .collect();
        Boundary(format!("batch_{suffix}"))
    }

    /// Pick a boundary that does not occur in any of the given serialized parts.
    ///
    /// `preferred` is tried first (normally the sentinel), then random tokens.
    pub fn choose<B: AsRef<[u8]>>(preferred: Boundary, parts: &[B]) -> Result<Self, MultipartError> {
        if !preferred.collides_with(parts) {
            return Ok(preferred);
        }
        for _ in 0..MAX_CHOOSE_ATTEMPTS {
            let candidate = Boundary::random();
            if !candidate.collides_with(parts) {
                return Ok(candidate);
            }
        }
        Err(MultipartError::BoundaryCollision {
            attempts: MAX_CHOOSE_ATTEMPTS + 1,
        })
    }

    /// Whether `--<token>` occurs anywhere in the given parts.
    pub fn collides_with<B: AsRef<[u8]>>(&self, parts: &[B]) -> bool {
        let delimiter = self.delimiter();
        parts
            .iter()
            .any(|part| find(part.as_ref(), delimiter.as_bytes()).is_some())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The delimiter line prefix, `--<token>`.
    pub fn delimiter(&self) -> String {
        format!("--{}", self.0)
    }

    /// The `Content-Type` value announcing this boundary, quoted when the
    /// token holds characters RFC 2045 only allows in a quoted string.
    pub fn content_type(&self) -> String {
        if self.0.bytes().all(is_token_char) {
            format!("multipart/mixed; boundary={}", self.0)
        } else {
            format!("multipart/mixed; boundary=\"{}\"", self.0)
        }
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self::default_sentinel()
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Boundary {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// RFC 2046 `bchars`.
fn is_bchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?' | b' '
        )
}

/// `bchars` that are also RFC 2045 `token` characters.
fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'\'' | b'+' | b'_' | b'-' | b'.')
}

/// Position of the first occurrence of `needle` in `haystack`.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
