//! The per-request context the router and the handlers work on.
//!
//! - [`ServerRequest`]: the request head and body, route parameters, typed extensions and
//!   the response slot
//! - [`BodyMut`]: mutable access to the request body that folds trailer fields into the
//!   request headers
//! - [`RouteParams`]: capture groups of the matched route pattern

use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Extensions, HeaderMap, Method, Request, Response, Uri, Version};
use http_body::{Body, Frame, SizeHint};
use mime::Mime;
use regex::{Captures, Regex};
use thiserror::Error;
use wick_http::protocol::body::ReqBody;
use wick_http::protocol::{ParseError, RequestHeader, merge_trailers};

use crate::body::ResponseBody;
use crate::handler::HandlerError;
use crate::responder::Responder;

/// A request being routed.
///
/// A handler answers by calling [`respond`](Self::respond); the first response is the one
/// sent, a second call fails with [`RespondError::AlreadyResponded`].
#[derive(Debug)]
pub struct ServerRequest {
    header: RequestHeader,
    body: ReqBody,
    params: RouteParams,
    response: Option<Response<ResponseBody>>,
    failure: Option<HandlerError>,
}

#[derive(Debug, Error)]
pub enum RespondError {
    #[error("request has already been responded")]
    AlreadyResponded,
}

impl ServerRequest {
    pub fn new(header: RequestHeader, body: ReqBody) -> Self {
        Self { header, body, params: RouteParams::default(), response: None, failure: None }
    }

    pub fn header(&self) -> &RequestHeader {
        &self.header
    }

    pub fn method(&self) -> &Method {
        self.header.method()
    }

    pub fn uri(&self) -> &Uri {
        self.header.uri()
    }

    /// The request path, always starting with `/`.
    pub fn path(&self) -> &str {
        self.header.uri().path()
    }

    pub fn query(&self) -> Option<&str> {
        self.header.uri().query()
    }

    pub fn version(&self) -> Version {
        self.header.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.header.headers()
    }

    /// The parsed `content-type` header, `None` when absent or unparsable.
    pub fn content_type(&self) -> Option<Mime> {
        self.headers().get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }

    /// The request body. Trailer fields received by the time the returned guard is dropped
    /// are merged into [`headers`](Self::headers).
    pub fn body_mut(&mut self) -> BodyMut<'_> {
        BodyMut { body: &mut self.body, headers: self.header.headers_mut() }
    }

    /// Capture groups of the route that is currently running.
    pub fn params(&self) -> &RouteParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: RouteParams) {
        self.params = params;
    }

    /// Typed values attached by middleware for the handlers that run after it.
    pub fn extensions(&self) -> &Extensions {
        self.header.as_ref().extensions()
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        self.header.as_mut().extensions_mut()
    }

    /// The failure an error handler is invoked for.
    pub fn failure(&self) -> Option<&HandlerError> {
        self.failure.as_ref()
    }

    pub(crate) fn set_failure(&mut self, failure: Option<HandlerError>) -> Option<HandlerError> {
        std::mem::replace(&mut self.failure, failure)
    }

    pub fn is_responded(&self) -> bool {
        self.response.is_some()
    }

    /// Records the response for this request.
    pub fn respond(&mut self, responder: impl Responder) -> Result<(), RespondError> {
        if self.response.is_some() {
            return Err(RespondError::AlreadyResponded);
        }

        let response = responder.response_to(self);
        self.response = Some(response);
        Ok(())
    }

    pub fn response(&self) -> Option<&Response<ResponseBody>> {
        self.response.as_ref()
    }

    pub fn response_mut(&mut self) -> Option<&mut Response<ResponseBody>> {
        self.response.as_mut()
    }

    pub fn take_response(&mut self) -> Option<Response<ResponseBody>> {
        self.response.take()
    }
}

impl From<Request<ReqBody>> for ServerRequest {
    fn from(request: Request<ReqBody>) -> Self {
        let (parts, body) = request.into_parts();
        ServerRequest::new(RequestHeader::from(parts), body)
    }
}

/// Borrow of a request body, see [`ServerRequest::body_mut`].
///
/// Reads through [`Deref`] to [`ReqBody`] or as an [`http_body::Body`]. On drop, trailers
/// that arrived with the end of a chunked body replace the `Trailer` declaration in the
/// request headers.
#[derive(Debug)]
pub struct BodyMut<'a> {
    body: &'a mut ReqBody,
    headers: &'a mut HeaderMap,
}

impl Deref for BodyMut<'_> {
    type Target = ReqBody;

    fn deref(&self) -> &ReqBody {
        &*self.body
    }
}

impl DerefMut for BodyMut<'_> {
    fn deref_mut(&mut self) -> &mut ReqBody {
        &mut *self.body
    }
}

impl Body for BodyMut<'_> {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, ParseError>>> {
        Pin::new(&mut *self.get_mut().body).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.body.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.body.size_hint()
    }
}

impl Drop for BodyMut<'_> {
    fn drop(&mut self) {
        if let Some(trailers) = self.body.take_trailers() {
            merge_trailers(self.headers, trailers);
        }
    }
}

/// Capture groups of a matched regex route.
///
/// Groups are addressed by position (group 0 is the whole match and is not stored, so
/// positions start at 1) or by name for named groups. Literal routes have no params.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    positional: Vec<Option<String>>,
    named: Vec<(String, String)>,
}

impl RouteParams {
    pub(crate) fn from_captures(regex: &Regex, captures: &Captures<'_>) -> Self {
        let positional = captures.iter().skip(1).map(|group| group.map(|m| m.as_str().to_owned())).collect();

        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| captures.name(name).map(|m| (name.to_owned(), m.as_str().to_owned())))
            .collect();

        Self { positional, named }
    }

    /// The value of group `index`, starting at 1. `None` for groups that did not participate.
    pub fn get(&self, index: usize) -> Option<&str> {
        let slot = self.positional.get(index.checked_sub(1)?)?;
        slot.as_deref()
    }

    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    pub fn named(&self) -> impl Iterator<Item = (&str, &str)> {
        self.named.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use http::StatusCode;
    use http::header::TRAILER;
    use http_body_util::BodyExt;
    use tokio_util::codec::FramedRead;
    use wick_http::codec::RequestDecoder;
    use wick_http::protocol::Message;

    fn request(uri: &str) -> ServerRequest {
        let request = Request::builder().uri(uri).body(ReqBody::empty()).unwrap();
        ServerRequest::from(request)
    }

    #[test]
    fn path_and_query() {
        let req = request("/search?q=wick");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=wick"));
        assert_eq!(req.method(), Method::GET);
    }

    #[test]
    fn content_type_is_parsed() {
        let json = Request::builder()
            .uri("/upload")
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(ReqBody::empty())
            .unwrap();
        let req = ServerRequest::from(json);

        let content_type = req.content_type().unwrap();
        assert_eq!(content_type.essence_str(), "application/json");
        assert_eq!(content_type.get_param(mime::CHARSET), Some(mime::UTF_8));
        assert!(request("/upload").content_type().is_none());
    }

    #[tokio::test]
    async fn drained_body_merges_trailers_into_headers() {
        let input = concat!(
            "POST /sum HTTP/1.1\r\n",
            "Transfer-Encoding: chunked\r\n",
            "Trailer: x-sum\r\n",
            "\r\n",
            "4\r\n20+2\r\n",
            "0\r\n",
            "x-sum: 42\r\n",
            "\r\n",
        );
        let mut stream = FramedRead::new(input.as_bytes(), RequestDecoder::new());
        let Some(Ok(Message::Header((header, payload_size)))) = stream.next().await else {
            panic!("expected a request head");
        };
        let (body, mut sender) = ReqBody::body_channel(&mut stream, payload_size);
        let mut req = ServerRequest::new(header, body);

        let finalize = async {
            req.body_mut().finalize().await.unwrap();
            assert_eq!(req.headers()["x-sum"], "42");
            assert!(req.headers().get(TRAILER).is_none());
        };

        tokio::select! {
            () = finalize => {},
            () = sender.send_body() => panic!("sender finished before the body was drained"),
        }
    }

    #[tokio::test]
    async fn collected_body_merges_trailers_into_headers() {
        let input = concat!(
            "POST /sum HTTP/1.1\r\n",
            "Transfer-Encoding: chunked\r\n",
            "Trailer: x-sum\r\n",
            "\r\n",
            "2\r\n40\r\n",
            "0\r\n",
            "x-sum: 42\r\n",
            "\r\n",
        );
        let mut stream = FramedRead::new(input.as_bytes(), RequestDecoder::new());
        let Some(Ok(Message::Header((header, payload_size)))) = stream.next().await else {
            panic!("expected a request head");
        };
        let (body, mut sender) = ReqBody::body_channel(&mut stream, payload_size);
        let mut req = ServerRequest::new(header, body);

        let collect = async {
            let collected = req.body_mut().collect().await.unwrap();
            assert_eq!(collected.to_bytes(), Bytes::from_static(b"40"));
            assert_eq!(req.headers()["x-sum"], "42");
        };

        tokio::select! {
            () = collect => {},
            () = sender.send_body() => panic!("sender finished before the body was collected"),
        }
    }

    #[test]
    fn second_respond_fails_and_keeps_the_first() {
        let mut req = request("/");

        req.respond((StatusCode::CREATED, "first")).unwrap();
        let second = req.respond("second");

        assert!(second.is_err_and(|e| matches!(e, RespondError::AlreadyResponded)));
        assert_eq!(req.response().unwrap().status(), StatusCode::CREATED);
    }

    #[test]
    fn extensions_carry_typed_values() {
        #[derive(Debug, Clone, PartialEq)]
        struct User(&'static str);

        let mut req = request("/");
        req.extensions_mut().insert(User("ada"));

        assert_eq!(req.extensions().get::<User>(), Some(&User("ada")));
    }

    #[test]
    fn optional_groups_are_none() {
        let regex = Regex::new(r"^/(a)?(b)").unwrap();
        let captures = regex.captures("/b").unwrap();
        let params = RouteParams::from_captures(&regex, &captures);

        assert_eq!(params.len(), 2);
        assert_eq!(params.get(0), None);
        assert_eq!(params.get(1), None);
        assert_eq!(params.get(2), Some("b"));
        assert_eq!(params.named().count(), 0);
    }
}
