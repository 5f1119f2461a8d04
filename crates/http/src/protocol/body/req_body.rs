use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::channel::{mpsc, oneshot};
use futures::{FutureExt, Stream, StreamExt};
use http::HeaderMap;
use http_body::{Body, Frame, SizeHint};
use tracing::{debug, error};

use super::{BufferedBody, drain_body, read_body};
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

type PayloadResult = Result<PayloadItem, ParseError>;

/// The body of a request received by the server.
///
/// Each `poll_frame` sends a oneshot sender through `signal`; the connection answers it
/// with the next payload item read from the socket. Reading is lazy, nothing is pulled
/// from the connection until the handler asks for it.
#[derive(Debug)]
pub struct ReqBody {
    signal: mpsc::Sender<oneshot::Sender<PayloadResult>>,
    receiving: Option<oneshot::Receiver<PayloadResult>>,
    payload_size: PayloadSize,
    eof: bool,
    leftover: Bytes,
    trailers: Option<HeaderMap>,
}

impl ReqBody {
    fn new(signal: mpsc::Sender<oneshot::Sender<PayloadResult>>, payload_size: PayloadSize) -> Self {
        Self { signal, receiving: None, payload_size, eof: payload_size.is_empty(), leftover: Bytes::new(), trailers: None }
    }

    /// Creates the body handed to the handler and the sender that feeds it from `payload_stream`.
    pub fn body_channel<S>(payload_stream: &mut S, payload_size: PayloadSize) -> (ReqBody, ReqBodySender<'_, S>)
    where
        S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
    {
        let (tx, receiver) = mpsc::channel(1);
        let req_body = ReqBody::new(tx, payload_size);
        let body_sender = ReqBodySender { payload_stream, receiver, eof: false, failure: None };
        (req_body, body_sender)
    }

    /// A body that is already at end of stream.
    pub fn empty() -> Self {
        let (tx, _receiver) = mpsc::channel(0);
        ReqBody::new(tx, PayloadSize::Empty)
    }

    /// Reads body bytes into `buf`, returns 0 at end of stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ParseError> {
        read_body(self, buf).await
    }

    /// Reads and discards the rest of the body. Calling it again is a no-op.
    pub async fn finalize(&mut self) -> Result<(), ParseError> {
        drain_body(self).await
    }

    /// The framing announced by the request head.
    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    /// Trailer fields, available once the body has been read to the end.
    pub fn trailers(&self) -> Option<&HeaderMap> {
        self.trailers.as_ref()
    }

    /// Moves the received trailer fields out, for merging them into the request headers
    /// with [`merge_trailers`](crate::protocol::merge_trailers).
    pub fn take_trailers(&mut self) -> Option<HeaderMap> {
        self.trailers.take()
    }
}

impl BufferedBody for ReqBody {
    fn leftover(&mut self) -> &mut Bytes {
        &mut self.leftover
    }
}

impl Body for ReqBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if !this.leftover.is_empty() {
            return Poll::Ready(Some(Ok(Frame::data(mem::take(&mut this.leftover)))));
        }

        loop {
            if this.eof {
                return Poll::Ready(None);
            }

            if let Some(oneshot_receiver) = &mut this.receiving {
                let received = ready!(oneshot_receiver.poll_unpin(cx));
                this.receiving = None;

                return match received {
                    Ok(Ok(PayloadItem::Chunk(bytes))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
                    Ok(Ok(PayloadItem::Trailers(trailers))) => {
                        this.trailers = Some(trailers.clone());
                        Poll::Ready(Some(Ok(Frame::trailers(trailers))))
                    }
                    Ok(Ok(PayloadItem::Eof)) => {
                        this.eof = true;
                        Poll::Ready(None)
                    }
                    Ok(Err(e)) => {
                        this.eof = true;
                        Poll::Ready(Some(Err(e)))
                    }
                    Err(_canceled) => {
                        this.eof = true;
                        Poll::Ready(Some(Err(ParseError::invalid_body("request body is no longer readable"))))
                    }
                };
            }

            if let Err(e) = ready!(this.signal.poll_ready(cx)) {
                this.eof = true;
                return Poll::Ready(Some(Err(ParseError::invalid_body(e))));
            }

            let (tx, rx) = oneshot::channel();
            if let Err(e) = this.signal.start_send(tx) {
                this.eof = true;
                return Poll::Ready(Some(Err(ParseError::invalid_body(e))));
            }
            this.receiving = Some(rx);
        }
    }

    fn is_end_stream(&self) -> bool {
        self.eof && self.leftover.is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        if self.is_end_stream() { SizeHint::with_exact(0) } else { self.payload_size.into() }
    }
}

/// The connection side of a [`ReqBody`].
///
/// Owns the payload stream for the lifetime of one request. It only reads the socket
/// when the body asks for an item, or when [`skip_body`](Self::skip_body) drains the rest.
#[derive(Debug)]
pub struct ReqBodySender<'conn, S> {
    payload_stream: &'conn mut S,
    receiver: mpsc::Receiver<oneshot::Sender<PayloadResult>>,
    eof: bool,
    failure: Option<String>,
}

impl<S> ReqBodySender<'_, S>
where
    S: Stream<Item = Result<Message<(RequestHeader, PayloadSize)>, ParseError>> + Unpin,
{
    /// Answers body read requests until the payload reaches EOF or the body is dropped.
    pub async fn send_body(&mut self) {
        while !self.eof {
            let Some(sender) = self.receiver.next().await else {
                return;
            };

            let item = self.next_item().await;
            if sender.send(item).is_err() {
                debug!("request body dropped while a read was in flight");
            }
        }
    }

    /// Reads the unread part of the payload, the connection is positioned
    /// at the next message afterwards.
    pub async fn skip_body(&mut self) -> Result<(), ParseError> {
        let mut size: usize = 0;
        while !self.eof {
            if let PayloadItem::Chunk(bytes) = self.next_item().await? {
                size += bytes.len();
            }
        }

        if size > 0 {
            debug!(size, "skipped unread request body");
        }
        Ok(())
    }

    /// True once the payload has been read to EOF or has failed to parse.
    pub fn is_finished(&self) -> bool {
        self.eof || self.failure.is_some()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    async fn next_item(&mut self) -> PayloadResult {
        if let Some(reason) = &self.failure {
            return Err(ParseError::invalid_body(reason));
        }

        let result = match self.payload_stream.next().await {
            Some(Ok(Message::Payload(payload_item))) => Ok(payload_item),
            Some(Ok(Message::Header(_))) => {
                error!("received header from receive body phase");
                Err(ParseError::invalid_body("received header from receive body phase"))
            }
            Some(Err(e)) => Err(e),
            None => Err(ParseError::invalid_body("connection closed before the request body was complete")),
        };

        match &result {
            Ok(item) if item.is_eof() => self.eof = true,
            Ok(_) => {}
            Err(e) => self.failure = Some(e.to_string()),
        }
        result
    }
}
