//! The head of a request: everything but the body.
//!
//! Produced by the request decoder, completed with a body by the connection and encoded
//! again by the client agent.

use http::request::Parts;
use http::{HeaderMap, Method, Request, Uri, Version};

#[derive(Debug)]
pub struct RequestHeader(Request<()>);

impl RequestHeader {
    /// Turns the head into a full request carrying `body`.
    pub fn body<T>(self, body: T) -> Request<T> {
        let (parts, ()) = self.0.into_parts();
        Request::from_parts(parts, body)
    }

    pub fn method(&self) -> &Method {
        self.0.method()
    }

    pub fn uri(&self) -> &Uri {
        self.0.uri()
    }

    pub fn version(&self) -> Version {
        self.0.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.0.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.0.headers_mut()
    }

    /// Whether a request with this method normally has a payload.
    ///
    /// Only consulted when encoding: an empty `POST`, `PUT` or `PATCH` body is still sent
    /// with `content-length: 0`. Decoding frames a `GET` with `Content-Length` like any other.
    pub fn expects_body(&self) -> bool {
        let bodiless = [Method::GET, Method::HEAD, Method::DELETE, Method::OPTIONS, Method::CONNECT, Method::TRACE];
        !bodiless.contains(self.method())
    }
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.0
    }
}

impl AsMut<Request<()>> for RequestHeader {
    fn as_mut(&mut self) -> &mut Request<()> {
        &mut self.0
    }
}

impl From<Request<()>> for RequestHeader {
    fn from(request: Request<()>) -> Self {
        Self(request)
    }
}

impl From<Parts> for RequestHeader {
    fn from(parts: Parts) -> Self {
        Self(Request::from_parts(parts, ()))
    }
}
