//! Inner HTTP messages.
//!
//! Each batch part carries one complete HTTP/1.1 message in its raw text form:
//!
//! ```text
//! <request-line | status-line>
//! <header>: <value>
//! ...
//! <blank line>
//! <body>
//! ```
//!
//! Serialization always emits CRLF. Parsing accepts CRLF or bare LF, since
//! batch servers are not consistent about it.

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Uri, Version, header};

use crate::error::MultipartError;

const CRLF: &[u8] = b"\r\n";

/// Serialize a request into its raw HTTP/1.1 form.
///
/// The request line carries the URI exactly as given (absolute URIs stay
/// absolute). A `Content-Length` header is added for non-empty bodies unless
/// the request already has one.
pub fn serialize_request(request: &Request<Bytes>) -> Vec<u8> {
    let body = request.body();
    let mut out = Vec::with_capacity(128 + body.len());
    out.extend_from_slice(request.method().as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(request.uri().to_string().as_bytes());
    out.extend_from_slice(b" HTTP/1.1");
    out.extend_from_slice(CRLF);
    write_headers(&mut out, request.headers(), body.len());
    out.extend_from_slice(body);
    out
}

/// Serialize a response into its raw HTTP/1.1 form.
pub fn serialize_response(response: &Response<Bytes>) -> Vec<u8> {
    let body = response.body();
    let status = response.status();
    let mut out = Vec::with_capacity(128 + body.len());
    out.extend_from_slice(b"HTTP/1.1 ");
    out.extend_from_slice(status.as_str().as_bytes());
    if let Some(reason) = status.canonical_reason() {
        out.push(b' ');
        out.extend_from_slice(reason.as_bytes());
    }
    out.extend_from_slice(CRLF);
    write_headers(&mut out, response.headers(), body.len());
    out.extend_from_slice(body);
    out
}

fn write_headers(out: &mut Vec<u8>, headers: &HeaderMap, body_len: usize) {
    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(CRLF);
    }
    if body_len > 0 && !headers.contains_key(header::CONTENT_LENGTH) {
        out.extend_from_slice(format!("content-length: {body_len}").as_bytes());
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(CRLF);
}

/// Parse a raw HTTP response (status line, headers, optional body).
///
/// `data` must be the buffer the message lives in; the body is returned as a
/// zero-copy slice of it.
pub fn parse_response(data: &Bytes) -> Result<Response<Bytes>, MultipartError> {
    parse_response_slice(data, data).map_err(MultipartError::MalformedMessage)
}

/// Parse a raw HTTP request (request line, headers, optional body).
pub fn parse_request(data: &Bytes) -> Result<Request<Bytes>, MultipartError> {
    parse_request_slice(data, data).map_err(MultipartError::MalformedMessage)
}

/// Parse a response held in `message`, a sub-slice of `source`.
pub(crate) fn parse_response_slice(source: &Bytes, message: &[u8]) -> Result<Response<Bytes>, String> {
    let message = skip_blank_lines(message);
    let (line, rest) = next_line(message).ok_or("empty HTTP message")?;
    let (version, status) = parse_status_line(line)?;
    let (headers, body) = parse_header_block(rest)?;
    let body = limit_body(&headers, body)?;

    let mut response = Response::new(source.slice_ref(body));
    *response.status_mut() = status;
    *response.version_mut() = version;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Parse a request held in `message`, a sub-slice of `source`.
pub(crate) fn parse_request_slice(source: &Bytes, message: &[u8]) -> Result<Request<Bytes>, String> {
    let message = skip_blank_lines(message);
    let (line, rest) = next_line(message).ok_or("empty HTTP message")?;
    let (method, uri, version) = parse_request_line(line)?;
    let (headers, body) = parse_header_block(rest)?;
    let body = limit_body(&headers, body)?;

    let mut request = Request::new(source.slice_ref(body));
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.version_mut() = version;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Split off the first line, stripping its `\n` or `\r\n` terminator.
///
/// Returns `None` only for empty input; an unterminated last line is
/// returned with an empty remainder.
pub(crate) fn next_line(data: &[u8]) -> Option<(&[u8], &[u8])> {
    if data.is_empty() {
        return None;
    }
    match data.iter().position(|&b| b == b'\n') {
        Some(i) => Some((strip_cr(&data[..i]), &data[i + 1..])),
        None => Some((strip_cr(data), &data[data.len()..])),
    }
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn skip_blank_lines(mut data: &[u8]) -> &[u8] {
    while let Some((line, rest)) = next_line(data) {
        if !line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
        data = rest;
    }
    data
}

/// Parse header lines up to the first blank line (or end of input).
///
/// Returns the headers and whatever follows the blank line.
pub(crate) fn parse_header_block(mut data: &[u8]) -> Result<(HeaderMap, &[u8]), String> {
    let mut headers = HeaderMap::new();
    while let Some((line, rest)) = next_line(data) {
        data = rest;
        if line.is_empty() {
            return Ok((headers, data));
        }
        if line[0] == b' ' || line[0] == b'\t' {
            return Err("obsolete header line folding is not supported".to_string());
        }
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| format!("header line without colon: {:?}", String::from_utf8_lossy(line)))?;
        let name = HeaderName::from_bytes(line[..colon].trim_ascii())
            .map_err(|e| format!("invalid header name: {e}"))?;
        let value = HeaderValue::from_bytes(line[colon + 1..].trim_ascii())
            .map_err(|e| format!("invalid value for header {name}: {e}"))?;
        headers.append(name, value);
    }
    Ok((headers, data))
}

fn parse_status_line(line: &[u8]) -> Result<(Version, StatusCode), String> {
    let line = std::str::from_utf8(line).map_err(|_| "status line is not valid UTF-8".to_string())?;
    let mut fields = line.splitn(3, ' ');
    let version = parse_version(fields.next().unwrap_or_default())
        .ok_or_else(|| format!("invalid status line: {line:?}"))?;
    let status = fields
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| format!("invalid status code in status line: {line:?}"))?;
    Ok((version, status))
}

fn parse_request_line(line: &[u8]) -> Result<(Method, Uri, Version), String> {
    let line = std::str::from_utf8(line).map_err(|_| "request line is not valid UTF-8".to_string())?;
    let mut fields = line.split(' ').filter(|f| !f.is_empty());
    let (Some(method), Some(uri), Some(version), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(format!("invalid request line: {line:?}"));
    };
    let method = Method::from_bytes(method.as_bytes()).map_err(|e| format!("invalid method: {e}"))?;
    let uri = uri.parse::<Uri>().map_err(|e| format!("invalid request target: {e}"))?;
    let version = parse_version(version).ok_or_else(|| format!("invalid HTTP version: {version:?}"))?;
    Ok((method, uri, version))
}

fn parse_version(version: &str) -> Option<Version> {
    match version {
        "HTTP/1.0" => Some(Version::HTTP_10),
        "HTTP/1.1" => Some(Version::HTTP_11),
        "HTTP/2" | "HTTP/2.0" => Some(Version::HTTP_2),
        _ => None,
    }
}

/// Cut the body to `Content-Length` when the header is present.
fn limit_body<'a>(headers: &HeaderMap, body: &'a [u8]) -> Result<&'a [u8], String> {
    let Some(value) = headers.get(header::CONTENT_LENGTH) else {
        return Ok(body);
    };
    let len = value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .ok_or_else(|| format!("invalid content-length: {value:?}"))?;
    if len > body.len() {
        return Err(format!(
            "content-length {len} exceeds the {} bytes available",
            body.len()
        ));
    }
    Ok(&body[..len])
}
