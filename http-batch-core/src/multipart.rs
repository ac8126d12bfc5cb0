//! `multipart/mixed` batch framing.
//!
//! A batch body is a sequence of parts, each wrapping one inner HTTP message:
//!
//! ```text
//! --<boundary>
//! Content-Type: application/http
//! Content-Transfer-Encoding: binary
//! Content-ID: response-<n>
//!
//! <inner HTTP message>
//! --<boundary>
//! ...
//! --<boundary>--
//! ```
//!
//! `n` is the 1-based position of the request in the batch. Responses are
//! correlated by position only; see [`decode`].

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};

use crate::boundary::Boundary;
use crate::error::MultipartError;
use crate::message::{
    parse_header_block, parse_request_slice, parse_response_slice, serialize_request,
    serialize_response,
};

/// Content type of every batch part.
pub const PART_CONTENT_TYPE: &str = "application/http";

/// Transfer encoding of every batch part.
pub const PART_TRANSFER_ENCODING: &str = "binary";

/// Prefix of the per-part `Content-ID` value.
pub const CONTENT_ID_PREFIX: &str = "response-";

/// Header carrying the part correlation id.
pub const CONTENT_ID: &str = "content-id";

/// An encoded batch body, ready to be sent.
#[derive(Clone, Debug)]
pub struct EncodedBatch {
    /// The boundary used to frame the parts.
    pub boundary: Boundary,
    /// The complete `multipart/mixed` body.
    pub body: Bytes,
    /// The `Content-Type` header value announcing `boundary`.
    pub content_type: String,
}

/// One decoded response part.
#[derive(Clone, Debug)]
pub struct MultipartPart {
    /// 1-based position of the originating request.
    pub content_id: usize,
    /// Status of the inner response.
    pub status: StatusCode,
    /// Headers of the inner response.
    pub headers: HeaderMap,
    /// Body of the inner response.
    pub body: Bytes,
}

impl MultipartPart {
    /// Whether the inner status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Rebuild the inner response as a standalone [`http::Response`].
    pub fn to_response(&self) -> Response<Bytes> {
        let mut response = Response::new(self.body.clone());
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Encode requests into a batch body using the default sentinel boundary
/// (or a random one if the sentinel occurs in a request).
pub fn encode<'a, I>(requests: I) -> Result<EncodedBatch, MultipartError>
where
    I: IntoIterator<Item = &'a Request<Bytes>>,
{
    encode_with_boundary(requests, Boundary::default())
}

/// Encode requests into a batch body, preferring the given boundary.
///
/// # Errors
///
/// - [`MultipartError::EmptyBatch`] if `requests` is empty
/// - [`MultipartError::BoundaryCollision`] if no collision-free boundary was found
pub fn encode_with_boundary<'a, I>(
    requests: I,
    preferred: Boundary,
) -> Result<EncodedBatch, MultipartError>
where
    I: IntoIterator<Item = &'a Request<Bytes>>,
{
    let inner: Vec<Vec<u8>> = requests.into_iter().map(serialize_request).collect();
    if inner.is_empty() {
        return Err(MultipartError::EmptyBatch);
    }

    let boundary = Boundary::choose(preferred, &inner)?;
    let body = write_parts(&boundary, &inner);
    let content_type = boundary.content_type();

    Ok(EncodedBatch {
        boundary,
        body,
        content_type,
    })
}

/// Encode responses into a batch reply body.
///
/// This is the server half of the format, used by batch endpoints and test
/// doubles. The caller picks the boundary and announces it in the reply's
/// `Content-Type`.
pub fn encode_responses(responses: &[Response<Bytes>], boundary: &Boundary) -> Bytes {
    let inner: Vec<Vec<u8>> = responses.iter().map(serialize_response).collect();
    write_parts(boundary, &inner)
}

fn write_parts(boundary: &Boundary, inner: &[Vec<u8>]) -> Bytes {
    let delimiter = boundary.delimiter();
    let size: usize = inner.iter().map(|p| p.len() + delimiter.len() + 128).sum();
    let mut body = Vec::with_capacity(size);

    for (index, raw) in inner.iter().enumerate() {
        body.extend_from_slice(delimiter.as_bytes());
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("Content-Type: {PART_CONTENT_TYPE}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Transfer-Encoding: {PART_TRANSFER_ENCODING}\r\n").as_bytes(),
        );
        body.extend_from_slice(
            format!("Content-ID: {CONTENT_ID_PREFIX}{}\r\n", index + 1).as_bytes(),
        );
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(raw);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(delimiter.as_bytes());
    body.extend_from_slice(b"--\r\n");

    Bytes::from(body)
}

/// Extract the `boundary` parameter from a `multipart/*` content type.
///
/// Quoted boundaries are unquoted. The server picks its own boundary, so this
/// must be read from every response rather than assumed.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let mut params = content_type.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if !mime.to_ascii_lowercase().starts_with("multipart/") {
        return Err(MultipartError::MissingBoundary(format!(
            "not a multipart content type: {content_type:?}"
        )));
    }

    params
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            MultipartError::MissingBoundary(format!(
                "no boundary parameter in {content_type:?}"
            ))
        })
}

/// Decode a batch reply into its response parts.
///
/// Preamble and epilogue are discarded. Parts are returned in request order:
/// if every part has a `Content-ID` and the ids are exactly `1..=n`, they
/// are ordered by id, otherwise by physical position (and `content_id` is set
/// to that position).
///
/// # Errors
///
/// - [`MultipartError::Unterminated`] if the closing delimiter is missing
/// - [`MultipartError::MalformedPart`] if a part's headers or inner status
///   line cannot be parsed
pub fn decode(body: &Bytes, boundary: &str) -> Result<Vec<MultipartPart>, MultipartError> {
    let parts = decode_with(body, boundary, parse_response_slice)?;
    Ok(parts
        .into_iter()
        .map(|(content_id, response)| {
            let (head, body) = response.into_parts();
            MultipartPart {
                content_id,
                status: head.status,
                headers: head.headers,
                body,
            }
        })
        .collect())
}

/// Decode a batch request body into its inner requests, in request order.
///
/// This is the server half of the format.
pub fn decode_requests(body: &Bytes, boundary: &str) -> Result<Vec<Request<Bytes>>, MultipartError> {
    let parts = decode_with(body, boundary, parse_request_slice)?;
    Ok(parts.into_iter().map(|(_, request)| request).collect())
}

type ParseFn<T> = fn(&Bytes, &[u8]) -> Result<T, String>;

fn decode_with<T>(
    body: &Bytes,
    boundary: &str,
    parse: ParseFn<T>,
) -> Result<Vec<(usize, T)>, MultipartError> {
    let raw_parts = split_parts(body, boundary)?;

    let mut ids = Vec::with_capacity(raw_parts.len());
    let mut messages = Vec::with_capacity(raw_parts.len());
    for (index, raw) in raw_parts.into_iter().enumerate() {
        let position = index + 1;
        let (headers, payload) =
            parse_header_block(raw).map_err(|reason| MultipartError::malformed(position, reason))?;
        ids.push(headers.get(CONTENT_ID).and_then(parse_content_id));
        let message =
            parse(body, payload).map_err(|reason| MultipartError::malformed(position, reason))?;
        messages.push(message);
    }

    match sequential_ids(&ids) {
        Some(ids) => {
            let mut ordered: Vec<(usize, T)> = ids.into_iter().zip(messages).collect();
            ordered.sort_by_key(|(id, _)| *id);
            Ok(ordered)
        }
        None => Ok(messages
            .into_iter()
            .enumerate()
            .map(|(index, message)| (index + 1, message))
            .collect()),
    }
}

/// Returns the ids if they are a permutation of `1..=n`.
fn sequential_ids(ids: &[Option<usize>]) -> Option<Vec<usize>> {
    let ids: Vec<usize> = ids.iter().copied().collect::<Option<_>>()?;
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(index, id)| *id == index + 1)
        .then_some(ids)
}

/// Parse `response-3`, `<response-3>`, `<response-response-3@host>` or `3`.
fn parse_content_id(value: &HeaderValue) -> Option<usize> {
    let value = value.to_str().ok()?.trim();
    let value = value.trim_start_matches('<').trim_end_matches('>');
    let mut id = value.split('@').next()?;
    while let Some(rest) = id.strip_prefix(CONTENT_ID_PREFIX) {
        id = rest;
    }
    id.parse::<usize>().ok().filter(|id| *id > 0)
}

enum Delimiter {
    Open,
    Close,
}

fn delimiter_kind(line: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(delimiter)?;
    if let Some(padding) = rest.strip_prefix(b"--") {
        return padding.trim_ascii().is_empty().then_some(Delimiter::Close);
    }
    rest.trim_ascii().is_empty().then_some(Delimiter::Open)
}

/// Split a body into raw part slices (part headers plus payload).
///
/// The line break preceding a delimiter belongs to the delimiter, not to the
/// part before it.
fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>, MultipartError> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let (line_end, next) = match body[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => (pos + i, pos + i + 1),
            None => (body.len(), body.len()),
        };
        let line = &body[pos..line_end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        if let Some(kind) = delimiter_kind(line, delimiter) {
            if let Some(start) = part_start.take() {
                parts.push(&body[start..content_end(body, start, pos)]);
            }
            match kind {
                Delimiter::Open => part_start = Some(next),
                Delimiter::Close => return Ok(parts),
            }
        }
        pos = next;
    }

    Err(MultipartError::Unterminated(boundary.to_string()))
}

/// End of a part's content given the start of the next delimiter line.
fn content_end(body: &[u8], start: usize, delimiter_pos: usize) -> usize {
    let mut end = delimiter_pos;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}
