//! Conversions from handler values into responses.
//!
//! [`ServerRequest::respond`] accepts anything implementing [`Responder`]: plain text
//! (`&'static str`, `String`), raw `Bytes`, a prepared `http::Response`, or any of those
//! paired with a status code.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Response, StatusCode};

use crate::body::ResponseBody;
use crate::request::ServerRequest;

/// A value that can be turned into the response of a request.
pub trait Responder {
    fn response_to(self, req: &ServerRequest) -> Response<ResponseBody>;
}

impl<T: Responder> Responder for Option<T> {
    fn response_to(self, req: &ServerRequest) -> Response<ResponseBody> {
        match self {
            Some(t) => t.response_to(req),
            None => Response::new(ResponseBody::empty()),
        }
    }
}

impl<B> Responder for Response<B>
where
    B: Into<ResponseBody>,
{
    fn response_to(self, _req: &ServerRequest) -> Response<ResponseBody> {
        self.map(Into::into)
    }
}

/// Overrides the status of the inner response.
impl<T: Responder> Responder for (StatusCode, T) {
    fn response_to(self, req: &ServerRequest) -> Response<ResponseBody> {
        let (status, responder) = self;
        let mut response = responder.response_to(req);
        *response.status_mut() = status;
        response
    }
}

impl Responder for () {
    fn response_to(self, _req: &ServerRequest) -> Response<ResponseBody> {
        Response::new(ResponseBody::empty())
    }
}

impl Responder for ResponseBody {
    fn response_to(self, _req: &ServerRequest) -> Response<ResponseBody> {
        Response::new(self)
    }
}

impl Responder for Bytes {
    fn response_to(self, _req: &ServerRequest) -> Response<ResponseBody> {
        with_content_type(ResponseBody::once(self), HeaderValue::from_static("application/octet-stream"))
    }
}

impl Responder for &'static str {
    fn response_to(self, _req: &ServerRequest) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), text_plain())
    }
}

impl Responder for String {
    fn response_to(self, _req: &ServerRequest) -> Response<ResponseBody> {
        with_content_type(ResponseBody::from(self), text_plain())
    }
}

fn text_plain() -> HeaderValue {
    HeaderValue::from_static("text/plain; charset=utf-8")
}

fn with_content_type(body: ResponseBody, content_type: HeaderValue) -> Response<ResponseBody> {
    let mut response = Response::new(body);
    response.headers_mut().insert(CONTENT_TYPE, content_type);
    response
}
