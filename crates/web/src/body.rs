use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http::HeaderMap;
use http_body::Body as HttpBody;
use http_body::{Frame, SizeHint};
use http_body_util::BodyExt;
use http_body_util::combinators::UnsyncBoxBody;

use crate::handler::HandlerError;

type TrailersFn = Box<dyn FnOnce() -> HeaderMap + Send>;

/// The body of a routed response.
///
/// The size hint decides the framing: an empty body gets no payload, `once` gets a
/// `content-length`, `stream` and `with_trailers` are sent chunked.
pub struct ResponseBody {
    inner: Kind,
}

enum Kind {
    Full(Option<Bytes>),
    Streaming(UnsyncBoxBody<Bytes, HandlerError>),
    Trailers { body: Box<ResponseBody>, trailers: Option<TrailersFn> },
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { inner: Kind::Full(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() { Self::empty() } else { Self { inner: Kind::Full(Some(bytes)) } }
    }

    pub fn stream<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<HandlerError>,
    {
        Self { inner: Kind::Streaming(UnsyncBoxBody::new(body.map_err(Into::into))) }
    }

    /// Sends `body` chunked and ends it with the trailer fields `trailers` returns.
    ///
    /// `trailers` runs once the last data frame has been produced, so values that depend
    /// on the whole body (checksums, final status) can be computed there.
    pub fn with_trailers<F>(body: ResponseBody, trailers: F) -> Self
    where
        F: FnOnce() -> HeaderMap + Send + 'static,
    {
        Self { inner: Kind::Trailers { body: Box::new(body), trailers: Some(Box::new(trailers)) } }
    }
}

impl From<String> for ResponseBody {
    fn from(value: String) -> Self {
        Self::once(Bytes::from(value))
    }
}

impl From<()> for ResponseBody {
    fn from((): ()) -> Self {
        Self::empty()
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        Self::once(bytes)
    }
}

impl From<Option<Bytes>> for ResponseBody {
    fn from(bytes: Option<Bytes>) -> Self {
        bytes.map_or_else(Self::empty, Self::once)
    }
}

impl From<&'static str> for ResponseBody {
    fn from(value: &'static str) -> Self {
        Self::once(Bytes::from_static(value.as_bytes()))
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Kind::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            Kind::Streaming(_) => f.debug_struct("Streaming").finish_non_exhaustive(),
            Kind::Trailers { body, .. } => f.debug_struct("Trailers").field("body", body).finish_non_exhaustive(),
        }
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = HandlerError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match &mut self.get_mut().inner {
            Kind::Full(remaining) => Poll::Ready(remaining.take().map(|bytes| Ok(Frame::data(bytes)))),
            Kind::Streaming(boxed) => Pin::new(boxed).poll_frame(cx),
            Kind::Trailers { body, trailers } => match Pin::new(body.as_mut()).poll_frame(cx) {
                Poll::Ready(None) => Poll::Ready(trailers.take().map(|f| Ok(Frame::trailers(f())))),
                other => other,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Kind::Full(remaining) => remaining.is_none(),
            Kind::Streaming(boxed) => boxed.is_end_stream(),
            Kind::Trailers { body, trailers } => trailers.is_none() && body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Kind::Full(None) => SizeHint::with_exact(0),
            Kind::Full(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Streaming(boxed) => boxed.size_hint(),
            // trailers need chunked framing, so the length is never announced
            Kind::Trailers { .. } => SizeHint::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http_body_util::StreamBody;
    use std::io;

    fn check_send<T: Send + Unpin>() {}

    #[test]
    fn is_send() {
        check_send::<ResponseBody>();
    }

    #[tokio::test]
    async fn string_body() {
        let s = "Hello world".to_string();
        let len = s.len() as u64;

        let mut body = ResponseBody::from(s);

        assert_eq!(body.size_hint().exact(), Some(len));
        assert!(!body.is_end_stream());

        let bytes = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(bytes, Bytes::from("Hello world"));

        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn empty_body() {
        let mut body = ResponseBody::from("");

        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn stream_body() {
        let chunks: Vec<Result<_, io::Error>> =
            vec![Ok(Frame::data(Bytes::from(vec![1]))), Ok(Frame::data(Bytes::from(vec![2])))];
        let mut body = ResponseBody::stream(StreamBody::new(futures::stream::iter(chunks)));

        assert!(body.size_hint().exact().is_none());
        assert_eq!(body.frame().await.unwrap().unwrap().into_data().unwrap().as_ref(), [1]);
        assert_eq!(body.frame().await.unwrap().unwrap().into_data().unwrap().as_ref(), [2]);
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn trailers_follow_the_data() {
        let mut body = ResponseBody::with_trailers(ResponseBody::from("payload"), || {
            let mut trailers = HeaderMap::new();
            trailers.insert("x-checksum", HeaderValue::from_static("abc"));
            trailers
        });

        assert!(body.size_hint().exact().is_none());

        let data = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(data, Bytes::from("payload"));
        assert!(!body.is_end_stream());

        let trailers = body.frame().await.unwrap().unwrap().into_trailers().unwrap();
        assert_eq!(trailers["x-checksum"], "abc");

        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }
}
