//! Request and response head encoders.
//!
//! Framing headers are derived from the [`PayloadSize`] that travels with the head:
//! a known length becomes `content-length`, an unknown one `transfer-encoding: chunked`.
//! Header names go out in their lower-case `HeaderName` form.

use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::header::{CONTENT_LENGTH, DATE, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderValue, StatusCode, Version};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::date::DateService;
use crate::protocol::{PayloadSize, RequestHeader, ResponseHead, SendError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const CHUNKED: HeaderValue = HeaderValue::from_static("chunked");
const ZERO: HeaderValue = HeaderValue::from_static("0");

/// Responses with these status codes never carry a payload.
pub(crate) fn status_forbids_body(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

/// Encodes a [`ResponseHead`] with its [`PayloadSize`].
///
/// Adds a `date` header when the handler did not set one, and fails with
/// [`SendError::UnknownStatus`] for status codes without a reason phrase.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseHeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for ResponseHeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        let status = header.status();
        let reason = status.canonical_reason().ok_or(SendError::UnknownStatus(status.as_u16()))?;
        let version = version_str(header.version())?;

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{version} {} {reason}\r\n", status.as_str())?;

        let headers = header.headers_mut();
        if !headers.contains_key(DATE) {
            headers.insert(DATE, DateService::global().http_date());
        }

        if status_forbids_body(status) {
            headers.remove(TRANSFER_ENCODING);
            if status != StatusCode::NOT_MODIFIED {
                headers.remove(CONTENT_LENGTH);
            }
        } else {
            set_framing(headers, payload_size, true);
        }

        write_headers(headers, dst);
        Ok(())
    }
}

/// Encodes a [`RequestHeader`] with its [`PayloadSize`].
///
/// The request target is written in origin form, `host` is filled from the URI authority
/// when missing. An empty body only gets `content-length: 0` on methods that usually carry
/// one, see [`RequestHeader::expects_body`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestHeaderEncoder;

impl Encoder<(RequestHeader, PayloadSize)> for RequestHeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (RequestHeader, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut header, payload_size) = item;

        let version = version_str(header.version())?;
        let expects_body = header.expects_body();
        let target = header.uri().path_and_query().map_or("/", |path_and_query| path_and_query.as_str());

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {target} {version}\r\n", header.method())?;

        let authority = header.uri().authority().cloned();
        let headers = header.headers_mut();
        if !headers.contains_key(HOST)
            && let Some(authority) = authority
        {
            let host = HeaderValue::from_str(authority.as_str()).map_err(|e| SendError::io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
            headers.insert(HOST, host);
        }

        set_framing(headers, payload_size, expects_body);

        write_headers(headers, dst);
        Ok(())
    }
}

fn version_str(version: Version) -> Result<&'static str, SendError> {
    match version {
        Version::HTTP_11 => Ok("HTTP/1.1"),
        Version::HTTP_10 => Ok("HTTP/1.0"),
        v => {
            error!(http_version = ?v, "unsupported http version");
            Err(SendError::UnsupportedVersion(v))
        }
    }
}

fn set_framing(headers: &mut HeaderMap, payload_size: PayloadSize, zero_length_when_empty: bool) {
    match payload_size {
        PayloadSize::Length(n) => {
            headers.remove(TRANSFER_ENCODING);
            headers.insert(CONTENT_LENGTH, n.into());
        }
        PayloadSize::Chunked => {
            headers.remove(CONTENT_LENGTH);
            headers.insert(TRANSFER_ENCODING, CHUNKED);
        }
        PayloadSize::Empty => {
            headers.remove(TRANSFER_ENCODING);
            if zero_length_when_empty {
                headers.insert(CONTENT_LENGTH, ZERO);
            } else {
                headers.remove(CONTENT_LENGTH);
            }
        }
    }
}

fn write_headers(headers: &HeaderMap, dst: &mut BytesMut) {
    for (header_name, header_value) in headers {
        dst.put_slice(header_name.as_ref());
        dst.put_slice(b": ");
        dst.put_slice(header_value.as_ref());
        dst.put_slice(b"\r\n");
    }
    dst.put_slice(b"\r\n");
}

/// `io::Write` over a `BytesMut` that never fails.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Request, Response};

    fn encode_response(response: ResponseHead, payload_size: PayloadSize) -> Result<String, SendError> {
        let mut dst = BytesMut::new();
        ResponseHeaderEncoder.encode((response, payload_size), &mut dst)?;
        Ok(String::from_utf8(dst.to_vec()).unwrap())
    }

    fn encode_request(request: Request<()>, payload_size: PayloadSize) -> String {
        let mut dst = BytesMut::new();
        RequestHeaderEncoder.encode((RequestHeader::from(request), payload_size), &mut dst).unwrap();
        String::from_utf8(dst.to_vec()).unwrap()
    }

    #[test]
    fn status_line_and_framing() {
        let response = Response::builder().status(StatusCode::NOT_FOUND).header("X-Trace", "abc").body(()).unwrap();
        let encoded = encode_response(response, PayloadSize::Length(9)).unwrap();

        assert!(encoded.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(encoded.contains("x-trace: abc\r\n"));
        assert!(encoded.contains("content-length: 9\r\n"));
        assert!(encoded.contains("date: "));
        assert!(encoded.ends_with("\r\n\r\n"));
    }

    #[test]
    fn chunked_replaces_content_length() {
        let response = Response::builder().header(CONTENT_LENGTH, "10").body(()).unwrap();
        let encoded = encode_response(response, PayloadSize::Chunked).unwrap();

        assert!(encoded.contains("transfer-encoding: chunked\r\n"));
        assert!(!encoded.contains("content-length"));
    }

    #[test]
    fn date_set_by_handler_is_kept() {
        let response = Response::builder().header(DATE, "Sun, 06 Nov 1994 08:49:37 GMT").body(()).unwrap();
        let encoded = encode_response(response, PayloadSize::Empty).unwrap();

        assert!(encoded.contains("date: Sun, 06 Nov 1994 08:49:37 GMT\r\n"));
        assert_eq!(encoded.matches("date:").count(), 1);
        assert!(encoded.contains("content-length: 0\r\n"));
    }

    #[test]
    fn unknown_status_fails() {
        let response = Response::builder().status(599).body(()).unwrap();
        let result = encode_response(response, PayloadSize::Empty);

        assert!(matches!(result, Err(SendError::UnknownStatus(599))));
    }

    #[test]
    fn no_framing_for_no_content() {
        let response = Response::builder().status(StatusCode::NO_CONTENT).body(()).unwrap();
        let encoded = encode_response(response, PayloadSize::Empty).unwrap();

        assert!(encoded.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(!encoded.contains("content-length"));
    }

    #[test]
    fn request_line_and_host() {
        let request = Request::get("http://example.com:8080/search?q=rust").body(()).unwrap();
        let encoded = encode_request(request, PayloadSize::Empty);

        assert!(encoded.starts_with("GET /search?q=rust HTTP/1.1\r\n"));
        assert!(encoded.contains("host: example.com:8080\r\n"));
        assert!(!encoded.contains("content-length"));
    }

    #[test]
    fn empty_post_gets_zero_length() {
        let request = Request::post("/submit").header(HOST, "localhost").body(()).unwrap();
        let encoded = encode_request(request, PayloadSize::Empty);

        assert!(encoded.starts_with("POST /submit HTTP/1.1\r\n"));
        assert!(encoded.contains("host: localhost\r\n"));
        assert!(encoded.contains("content-length: 0\r\n"));
    }
}
