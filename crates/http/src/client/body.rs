use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, Response};
use http_body::{Body, Frame, SizeHint};
use tokio::sync::OwnedMutexGuard;
use tracing::trace;

use super::agent::ConnState;
use super::connector::ClientConnection;
use crate::protocol::body::{BufferedBody, drain_body, read_body};
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, merge_trailers};

/// The connection lent to a response body until it is read to the end or dropped.
pub(crate) struct BodyState {
    pub(crate) guard: OwnedMutexGuard<ConnState>,
    pub(crate) connection: ClientConnection,
    pub(crate) close_after_body: bool,
}

impl BodyState {
    /// Hands the connection back to the agent. A body that was not read to the end is
    /// drained before the next request goes out.
    pub(crate) fn release(mut self) {
        *self.guard = if self.close_after_body { ConnState::Closed } else { ConnState::Connected(self.connection) };
    }

    fn poison(mut self) {
        *self.guard = ConnState::Closed;
    }
}

/// The body of a response received by an [`Agent`](super::Agent).
///
/// While the body is alive the agent is busy; reading it to the end, or dropping it, makes
/// the connection available again.
pub struct ClientBody {
    state: Option<BodyState>,
    payload_size: PayloadSize,
    eof: bool,
    leftover: Bytes,
    trailers: Option<HeaderMap>,
}

impl ClientBody {
    pub(crate) fn new(state: BodyState, payload_size: PayloadSize) -> Self {
        Self { state: Some(state), payload_size, eof: false, leftover: Bytes::new(), trailers: None }
    }

    pub(crate) fn empty() -> Self {
        Self { state: None, payload_size: PayloadSize::Empty, eof: true, leftover: Bytes::new(), trailers: None }
    }

    /// Reads body bytes into `buf`, returns 0 at end of stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ParseError> {
        read_body(self, buf).await
    }

    /// Reads and discards the rest of the body. Calling it again is a no-op.
    pub async fn finalize(&mut self) -> Result<(), ParseError> {
        drain_body(self).await
    }

    pub fn payload_size(&self) -> PayloadSize {
        self.payload_size
    }

    /// Trailer fields, available once the body has been read to the end.
    pub fn trailers(&self) -> Option<&HeaderMap> {
        self.trailers.as_ref()
    }

    /// Moves the received trailer fields out, see [`finalize_response`].
    pub fn take_trailers(&mut self) -> Option<HeaderMap> {
        self.trailers.take()
    }

    fn fail(&mut self, e: ParseError) -> Poll<Option<Result<Frame<Bytes>, ParseError>>> {
        self.eof = true;
        if let Some(state) = self.state.take() {
            state.poison();
        }
        Poll::Ready(Some(Err(e)))
    }
}

/// Reads the rest of the response body and merges its trailer fields into the response
/// headers, dropping the `Trailer` declaration.
///
/// The body bytes that were not read yet are discarded.
pub async fn finalize_response(response: &mut Response<ClientBody>) -> Result<(), ParseError> {
    response.body_mut().finalize().await?;
    if let Some(trailers) = response.body_mut().take_trailers() {
        merge_trailers(response.headers_mut(), trailers);
    }
    Ok(())
}

impl BufferedBody for ClientBody {
    fn leftover(&mut self) -> &mut Bytes {
        &mut self.leftover
    }
}

impl Body for ClientBody {
    type Data = Bytes;
    type Error = ParseError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if !this.leftover.is_empty() {
            return Poll::Ready(Some(Ok(Frame::data(mem::take(&mut this.leftover)))));
        }

        if this.eof {
            return Poll::Ready(None);
        }

        let Some(state) = &mut this.state else {
            return Poll::Ready(None);
        };

        match ready!(state.connection.framed_read.poll_next_unpin(cx)) {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => Poll::Ready(Some(Ok(Frame::data(bytes)))),
            Some(Ok(Message::Payload(PayloadItem::Trailers(trailers)))) => {
                this.trailers = Some(trailers.clone());
                Poll::Ready(Some(Ok(Frame::trailers(trailers))))
            }
            Some(Ok(Message::Payload(PayloadItem::Eof))) => {
                this.eof = true;
                if let Some(state) = this.state.take() {
                    state.release();
                }
                Poll::Ready(None)
            }
            Some(Ok(Message::Header(_))) => this.fail(ParseError::invalid_body("received response head while reading body")),
            Some(Err(e)) => this.fail(e),
            None => this.fail(ParseError::invalid_body("connection closed before the response body was complete")),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.eof && self.leftover.is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        if self.is_end_stream() { SizeHint::with_exact(0) } else { self.payload_size.into() }
    }
}

impl Drop for ClientBody {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            trace!("response body dropped before end of stream");
            state.release();
        }
    }
}

impl std::fmt::Debug for ClientBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBody").field("payload_size", &self.payload_size).field("eof", &self.eof).finish_non_exhaustive()
    }
}
