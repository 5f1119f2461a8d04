//! Request and response head decoders.
//!
//! Both decoders parse with `httparse`, record the byte ranges of header names and values,
//! then split the head off the read buffer and slice the values out of it without copying.
//!
//! Limits: at most [`MAX_HEADER_NUM`] headers and [`MAX_HEADER_BYTES`] bytes of head.
//! Only HTTP/1.0 and HTTP/1.1 are accepted.
//!
//! The framing of the following payload is decided from the head alone:
//!
//! 1. `Transfer-Encoding` listing `chunked` selects chunked framing
//! 2. otherwise a valid `Content-Length` selects fixed length framing
//! 3. otherwise there is no payload
//!
//! Both headers together, a bad or ambiguous `Content-Length` and a request
//! `Transfer-Encoding` without `chunked` are rejected as [`ParseError::InvalidFraming`].

use bytes::{Bytes, BytesMut};
use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Version};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadSize, RequestHeader, ResponseHead};

/// Maximum number of headers allowed in a message head
pub const MAX_HEADER_NUM: usize = 64;

/// Maximum size in bytes allowed for the entire head section
pub const MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decodes request heads, implementing the [`Decoder`] trait.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestHeaderDecoder;

impl Decoder for RequestHeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // "GET / HTTP/1.1\n\n" is the shortest complete request
        if src.len() < 16 {
            return Ok(None);
        }

        if !check_start_line(src, StartLine::Request)? {
            return Ok(None);
        }

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let mut req = httparse::Request::new(&mut headers);

        let body_offset = match req.parse(src).map_err(map_httparse_error)? {
            Status::Complete(body_offset) => body_offset,
            Status::Partial => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                return Ok(None);
            }
        };

        trace!(head_size = body_offset, "parsed request head");
        ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

        let version = parse_version(req.version)?;
        let method = Method::from_bytes(req.method.ok_or(ParseError::InvalidMethod)?.as_bytes())
            .map_err(|_invalid| ParseError::InvalidMethod)?;
        let path = req.path.ok_or(ParseError::InvalidUri)?;
        ensure!(path.starts_with('/') || path == "*" || path.contains("://"), ParseError::InvalidUri);
        let uri = http::Uri::try_from(path).map_err(|_invalid| ParseError::InvalidUri)?;

        let header_count = req.headers.len();
        let mut header_index = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
        HeaderIndex::record(src, req.headers, &mut header_index);

        let mut request = Request::new(());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;

        let head_bytes = src.split_to(body_offset).freeze();
        fill_headers(request.headers_mut(), &head_bytes, &header_index[..header_count])?;

        let payload_size = parse_payload(request.headers(), true)?;
        Ok(Some((RequestHeader::from(request), payload_size)))
    }
}

/// Decodes response heads, implementing the [`Decoder`] trait.
///
/// The decoder has to know whether the request it answers was a `HEAD`, such responses
/// never carry a payload whatever their headers say. Interim `1xx` responses other than
/// `101 Switching Protocols` are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseHeaderDecoder {
    head_request: bool,
}

impl ResponseHeaderDecoder {
    pub fn set_head_request(&mut self, head_request: bool) {
        self.head_request = head_request;
    }
}

impl Decoder for ResponseHeaderDecoder {
    type Item = (ResponseHead, PayloadSize);
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // "HTTP/1.1 200\n\n"
            if src.len() < 14 {
                return Ok(None);
            }

            if !check_start_line(src, StartLine::Response)? {
                return Ok(None);
            }

            let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
            let mut resp = httparse::Response::new(&mut headers);

            let body_offset = match resp.parse(src).map_err(map_httparse_error)? {
                Status::Complete(body_offset) => body_offset,
                Status::Partial => {
                    ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
                    return Ok(None);
                }
            };

            trace!(head_size = body_offset, "parsed response head");
            ensure!(body_offset <= MAX_HEADER_BYTES, ParseError::too_large_header(body_offset, MAX_HEADER_BYTES));

            let version = parse_version(resp.version)?;
            let code = resp.code.ok_or_else(|| ParseError::malformed_start_line("missing status code"))?;
            let status = StatusCode::from_u16(code).map_err(|e| ParseError::malformed_start_line(e.to_string()))?;

            let header_count = resp.headers.len();
            let mut header_index = [HeaderIndex::EMPTY; MAX_HEADER_NUM];
            HeaderIndex::record(src, resp.headers, &mut header_index);

            let head_bytes = src.split_to(body_offset).freeze();

            if status.is_informational() && status != StatusCode::SWITCHING_PROTOCOLS {
                trace!(status = code, "skipped interim response");
                continue;
            }

            let mut response = Response::new(());
            *response.status_mut() = status;
            *response.version_mut() = version;
            fill_headers(response.headers_mut(), &head_bytes, &header_index[..header_count])?;

            let payload_size = if self.head_request
                || status.is_informational()
                || status == StatusCode::NO_CONTENT
                || status == StatusCode::NOT_MODIFIED
            {
                PayloadSize::Empty
            } else {
                parse_payload(response.headers(), false)?
            };

            return Ok(Some((response, payload_size)));
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StartLine {
    Request,
    Response,
}

/// Checks the token layout of the start line before handing the head to `httparse`.
///
/// A request line is exactly `method SP target SP version`, a status line is
/// `version SP status [SP reason]`. Returns `Ok(false)` while the line is incomplete.
fn check_start_line(src: &[u8], kind: StartLine) -> Result<bool, ParseError> {
    // empty lines before the start line are tolerated
    let start = src.iter().position(|b| *b != b'\r' && *b != b'\n').unwrap_or(src.len());
    let Some(line_len) = src[start..].iter().position(|b| *b == b'\n') else {
        ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::too_large_header(src.len(), MAX_HEADER_BYTES));
        return Ok(false);
    };

    let line = &src[start..start + line_len];
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    match kind {
        StartLine::Request => {
            let tokens = line.split(|b| *b == b' ').collect::<Vec<_>>();
            ensure!(
                tokens.len() == 3 && tokens.iter().all(|token| !token.is_empty()),
                ParseError::malformed_start_line(format!("expected 3 tokens in request line, got {:?}", String::from_utf8_lossy(line)))
            );
        }
        StartLine::Response => {
            let mut tokens = line.splitn(3, |b| *b == b' ');
            let version = tokens.next().unwrap_or_default();
            let status = tokens.next().unwrap_or_default();
            ensure!(
                !version.is_empty() && status.len() == 3,
                ParseError::malformed_start_line(format!("invalid status line {:?}", String::from_utf8_lossy(line)))
            );
        }
    }

    Ok(true)
}

fn map_httparse_error(e: Error) -> ParseError {
    match e {
        Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
        Error::Token | Error::Status => ParseError::malformed_start_line(e.to_string()),
        Error::Version => ParseError::InvalidVersion(None),
        e => ParseError::invalid_header(e.to_string()),
    }
}

fn parse_version(version: Option<u8>) -> Result<Version, ParseError> {
    match version {
        Some(0) => Ok(Version::HTTP_10),
        Some(1) => Ok(Version::HTTP_11),
        // HTTP/2 and HTTP/3 are not spoken on this codec
        _ => Err(ParseError::InvalidVersion(version)),
    }
}

fn fill_headers(headers: &mut HeaderMap, head_bytes: &Bytes, indices: &[HeaderIndex]) -> Result<(), ParseError> {
    headers.reserve(indices.len());
    for index in indices {
        let name = HeaderName::from_bytes(&head_bytes[index.name.0..index.name.1]).map_err(ParseError::invalid_header)?;

        // SAFETY: httparse only accepts header values made of visible ascii, obs-text,
        // spaces and tabs, which is exactly what `HeaderValue` allows.
        let value = unsafe { HeaderValue::from_maybe_shared_unchecked(head_bytes.slice(index.value.0..index.value.1)) };

        headers.append(name, value);
    }
    Ok(())
}

/// Byte ranges of a header's name and value within the read buffer.
#[derive(Clone, Copy)]
struct HeaderIndex {
    name: (usize, usize),
    value: (usize, usize),
}

impl HeaderIndex {
    const EMPTY: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            let name_end = name_start + header.name.len();
            indices.name = (name_start, name_end);
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            let value_end = value_start + header.value.len();
            indices.value = (value_start, value_end);
        }
    }
}

/// Decides the payload framing from the message headers.
///
/// refer: <https://www.rfc-editor.org/rfc/rfc9112.html#name-message-body-length>
fn parse_payload(headers: &HeaderMap, is_request: bool) -> Result<PayloadSize, ParseError> {
    let has_transfer_encoding = headers.contains_key(TRANSFER_ENCODING);
    let content_length = parse_content_length(headers)?;

    match (has_transfer_encoding, content_length) {
        (true, Some(_)) => Err(ParseError::invalid_framing("transfer-encoding and content-length both present")),
        (true, None) if is_chunked(headers) => Ok(PayloadSize::Chunked),
        (true, None) if is_request => Err(ParseError::invalid_framing("request transfer-encoding without chunked")),
        (_, None) => Ok(PayloadSize::Empty),
        (false, Some(length)) => Ok(PayloadSize::Length(length)),
    }
}

/// Parses every `Content-Length` value; repeated values must all agree.
fn parse_content_length(headers: &HeaderMap) -> Result<Option<u64>, ParseError> {
    let mut content_length: Option<u64> = None;

    for value in headers.get_all(CONTENT_LENGTH) {
        for item in value.as_bytes().split(|b| *b == b',') {
            let item = item.trim_ascii();
            ensure!(
                !item.is_empty() && item.iter().all(u8::is_ascii_digit),
                ParseError::invalid_framing(format!("invalid content-length {:?}", String::from_utf8_lossy(item)))
            );

            let length = std::str::from_utf8(item)
                .ok()
                .and_then(|item| item.parse::<u64>().ok())
                .ok_or_else(|| ParseError::invalid_framing("content-length overflows"))?;

            match content_length {
                Some(previous) if previous != length => {
                    return Err(ParseError::invalid_framing(format!("conflicting content-length {previous} and {length}")));
                }
                _ => content_length = Some(length),
            }
        }
    }

    Ok(content_length)
}

/// True if any `Transfer-Encoding` value lists `chunked` (case-insensitive).
fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .flat_map(|value| value.as_bytes().split(|b| *b == b','))
        .any(|coding| coding.trim_ascii().eq_ignore_ascii_case(b"chunked"))
}
