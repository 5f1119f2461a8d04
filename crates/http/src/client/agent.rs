use std::fmt::{self, Display};
use std::mem;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::{Method, Request, Response, StatusCode, Uri};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::select;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::body::{BodyState, ClientBody};
use super::connector::{ClientConnection, Target, connect};
use super::{AgentConfig, AgentError};
use crate::protocol::keep_alive::{connection_has_token, wants_close};
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader, SendError};

pub(crate) enum ConnState {
    /// not connected yet
    Idle,
    Connected(ClientConnection),
    /// closed by the peer or after a failure, never reopened
    Closed,
}

/// An HTTP/1.1 client bound to one origin over one persistent connection.
///
/// The connection is opened by the first [`send`](Self::send) and reused by the following
/// ones. Requests never overlap: a `send` issued while another one is in flight, or while
/// the previous response body is still held, fails with [`AgentError::Busy`]. Once the
/// server closes the connection every `send` fails with [`AgentError::ConnectionClosed`].
///
/// ```no_run
/// use http::Request;
/// use http_body_util::{BodyExt, Empty};
/// use bytes::Bytes;
/// use wick_http::client::Agent;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let agent = Agent::new("http://127.0.0.1:8080")?;
/// let response = agent.send(Request::get("/").body(Empty::<Bytes>::new())?).await?;
/// let body = response.into_body().collect().await?.to_bytes();
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    target: Target,
    config: AgentConfig,
    state: Arc<Mutex<ConnState>>,
}

impl Agent {
    pub fn new(origin: &str) -> Result<Self, AgentError> {
        Self::with_config(origin, AgentConfig::default())
    }

    pub fn with_config(origin: &str, config: AgentConfig) -> Result<Self, AgentError> {
        let uri = Uri::try_from(origin).map_err(AgentError::invalid_uri)?;
        let target = Target::from_uri(&uri)?;
        Ok(Self { target, config, state: Arc::new(Mutex::new(ConnState::Idle)) })
    }

    /// Sends `request` and waits for the response head.
    ///
    /// The returned body streams from the connection; the agent is busy until it has been
    /// read to the end or dropped.
    pub async fn send<B>(&self, request: Request<B>) -> Result<Response<ClientBody>, AgentError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.target.resolve(&parts.uri)?;
        let head_request = parts.method == Method::HEAD;
        let request_close = connection_has_token(&parts.headers, "close");

        let mut guard = Arc::clone(&self.state).try_lock_owned().map_err(|_locked| AgentError::Busy)?;

        // whatever goes wrong from here on leaves the agent closed
        let mut connection = match mem::replace(&mut *guard, ConnState::Closed) {
            ConnState::Idle => match connect(&self.target, &self.config).await {
                Ok(connection) => connection,
                Err(e) => {
                    *guard = ConnState::Idle;
                    return Err(e);
                }
            },
            ConnState::Connected(connection) => connection,
            ConnState::Closed => return Err(AgentError::ConnectionClosed),
        };

        drain_unread_body(&mut connection).await?;

        write_request(&mut connection, RequestHeader::from(parts), body).await?;

        connection.framed_read.decoder_mut().set_head_request(head_request);
        let (head, payload_size) = match connection.framed_read.next().await {
            Some(Ok(Message::Header(head))) => head,
            Some(Ok(Message::Payload(_))) => return Err(ParseError::invalid_body("received payload before response head").into()),
            Some(Err(e)) => return Err(e.into()),
            None => return Err(AgentError::ConnectionClosed),
        };

        let close_after_body =
            request_close || head.status() == StatusCode::SWITCHING_PROTOCOLS || wants_close(head.headers(), head.version());
        trace!(status = head.status().as_u16(), ?payload_size, close_after_body, "received response head");

        let state = BodyState { guard, connection, close_after_body };
        let body = if payload_size.is_empty() {
            finish_empty_body(state).await?
        } else {
            ClientBody::new(state, payload_size)
        };

        let (parts, ()) = head.into_parts();
        Ok(Response::from_parts(parts, body))
    }

    /// Like [`send`](Self::send), but gives up with [`AgentError::Cancelled`] once `cancel`
    /// fires. A cancelled exchange leaves the connection closed.
    pub async fn send_with_cancel<B>(&self, request: Request<B>, cancel: CancellationToken) -> Result<Response<ClientBody>, AgentError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        select! {
            biased;
            () = cancel.cancelled() => Err(AgentError::Cancelled),
            result = self.send(request) => result,
        }
    }

    /// True once the connection is gone for good.
    pub fn is_closed(&self) -> bool {
        self.state.try_lock().is_ok_and(|state| matches!(*state, ConnState::Closed))
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent").field("target", &self.target).field("config", &self.config).finish_non_exhaustive()
    }
}

async fn drain_unread_body(connection: &mut ClientConnection) -> Result<(), AgentError> {
    let mut size: usize = 0;
    while connection.framed_read.decoder().is_reading_payload() {
        match connection.framed_read.next().await {
            Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => size += bytes.len(),
            Some(Ok(Message::Payload(_))) => {}
            Some(Ok(Message::Header(_))) => return Err(ParseError::invalid_body("received response head while draining body").into()),
            Some(Err(e)) => return Err(e.into()),
            None => return Err(AgentError::ConnectionClosed),
        }
    }

    if size > 0 {
        debug!(size, "drained unread response body");
    }
    Ok(())
}

async fn write_request<B>(connection: &mut ClientConnection, header: RequestHeader, mut body: B) -> Result<(), AgentError>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Display,
{
    let payload_size = PayloadSize::from(body.size_hint());
    let framed_write = &mut connection.framed_write;

    framed_write.feed(Message::<_, Bytes>::Header((header, payload_size))).await.map_err(AgentError::from_send)?;

    loop {
        match body.frame().await {
            Some(Ok(frame)) => {
                let payload_item = match frame.into_data() {
                    Ok(data) => PayloadItem::Chunk(data),
                    Err(frame) => match frame.into_trailers() {
                        Ok(trailers) => PayloadItem::Trailers(trailers),
                        Err(_unknown_frame) => continue,
                    },
                };
                let finished = payload_item.is_trailers();
                framed_write.feed(Message::Payload(payload_item)).await.map_err(AgentError::from_send)?;
                if finished {
                    break;
                }
            }
            Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve request body error: {e}")).into()),
            None => {
                framed_write.feed(Message::Payload(PayloadItem::<Bytes>::Eof)).await.map_err(AgentError::from_send)?;
                break;
            }
        }
    }

    SinkExt::<Message<(RequestHeader, PayloadSize), Bytes>>::flush(framed_write).await.map_err(AgentError::from_send)
}

/// Consumes the end marker of a payload-less response and gives the connection back.
async fn finish_empty_body(mut state: BodyState) -> Result<ClientBody, AgentError> {
    match state.connection.framed_read.next().await {
        Some(Ok(Message::Payload(PayloadItem::Eof))) => {
            state.release();
            Ok(ClientBody::empty())
        }
        Some(Err(e)) => Err(e.into()),
        _ => Err(ParseError::invalid_body("expected end of empty response body").into()),
    }
}

