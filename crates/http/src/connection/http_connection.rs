use std::error::Error;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, Stream, StreamExt};
use http::header::{CONNECTION, EXPECT};
use http::{HeaderValue, Method, Response, StatusCode, Version};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::select;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::connection::{ConnectionConfig, OnUpgrade, Upgraded};
use crate::handler::Handler;
use crate::protocol::body::ReqBody;
use crate::protocol::keep_alive::{KeepAliveParams, connection_has_token, wants_close};
use crate::protocol::{HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHeader, ResponseHead, SendError};
use crate::timeout::TimeoutReader;

const CLOSE: HeaderValue = HeaderValue::from_static("close");

/// A server side HTTP/1.x connection.
///
/// Requests are served strictly one after another: the next head is decoded only once the
/// previous response is written and the previous body fully drained. The connection stays
/// open until one of these happens:
///
/// - the peer closes it, or stays idle past the keep-alive timeout
/// - either side sends `Connection: close`, or an HTTP/1.0 request lacks `Connection: keep-alive`
/// - the request limit is reached or the request body fails to parse
/// - a malformed request arrives, answered with `400 Bad Request` where possible
/// - the shutdown token is cancelled, checked before each new request
/// - a `101 Switching Protocols` response hands the connection to its [`OnUpgrade`]
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<TimeoutReader<R>, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    config: ConnectionConfig,
    shutdown: CancellationToken,
}

/// What the connection does after a response went out.
struct SentResponse {
    close: bool,
    upgrade: Option<OnUpgrade>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, ConnectionConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: ConnectionConfig) -> Self {
        let reader = TimeoutReader::new(reader, config.get_read_timeout());
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), config.get_read_buffer_size()),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Closes the connection at the next request boundary once `shutdown` is cancelled.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    /// Serves requests until the connection closes.
    ///
    /// Returns `Ok` when the connection ended normally. Errors are returned after the
    /// connection has been given up; [`HttpError::is_transport`] tells I/O failures and
    /// timeouts apart from protocol violations.
    pub async fn process<H>(mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let mut keep_alive_timeout = self.config.get_keep_alive_timeout();
        let mut max_requests = self.config.get_max_requests();
        let mut served: usize = 0;

        loop {
            let next = select! {
                biased;
                () = self.shutdown.cancelled() => {
                    debug!(served, "shutdown requested, closing connection");
                    return Ok(());
                }
                next = next_message(&mut self.framed_read, keep_alive_timeout) => next,
            };

            let Some(next) = next else {
                debug!(served, "keep-alive timeout, closing idle connection");
                return Ok(());
            };

            match next {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    served += 1;

                    if let Some(params) = KeepAliveParams::from_headers(header.headers()) {
                        trace!(?params, "client keep-alive parameters");
                        keep_alive_timeout = params.timeout.or(keep_alive_timeout);
                        max_requests = params.max.or(max_requests);
                    }
                    let last = max_requests.is_some_and(|max| served >= max);

                    let sent = self.do_process(header, payload_size, &handler, last).await?;

                    if let Some(on_upgrade) = sent.upgrade {
                        self.upgrade(on_upgrade).await;
                        return Ok(());
                    }

                    if sent.close {
                        debug!(served, "closing connection after response");
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received payload while waiting for a request head");
                    self.send_bad_request().await;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) if e.is_transport() => {
                    debug!(cause = %e, "can't receive next request, closing connection");
                    return Err(e.into());
                }

                Some(Err(e)) => {
                    warn!(cause = %e, "malformed request, closing connection");
                    self.send_bad_request().await;
                    return Err(e.into());
                }

                None => {
                    trace!(served, "peer closed connection");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process<H>(
        &mut self,
        header: RequestHeader,
        payload_size: PayloadSize,
        handler: &Arc<H>,
        last: bool,
    ) -> Result<SentResponse, HttpError>
    where
        H: Handler,
        H::RespBody: Body<Data = Bytes> + Unpin,
        <H::RespBody as Body>::Error: Display,
    {
        let head_request = header.method() == Method::HEAD;
        let mut close = last || wants_close(header.headers(), header.version());

        if !payload_size.is_empty() && expects_continue(&header) {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            debug!("receive expect request header, sent continue response");
        }

        let (response_result, body_failed) = {
            let (req_body, mut body_sender) = ReqBody::body_channel(&mut self.framed_read, payload_size);
            let request = header.body(req_body);

            // the handler and the body reads share the connection, both are driven here
            let response_result = {
                tokio::pin! {
                    let request_handle_future = handler.call(request);
                    let body_sender_future = body_sender.send_body();
                }

                let mut body_done = false;
                loop {
                    select! {
                        biased;
                        response = &mut request_handle_future => break response,
                        () = &mut body_sender_future, if !body_done => body_done = true,
                    }
                }
            };

            // skip body if request handler don't read body
            let body_failed = match body_sender.skip_body().await {
                Ok(()) => false,
                Err(e) => {
                    warn!(cause = %e, "request body failed, connection will be closed");
                    true
                }
            };
            (response_result, body_failed)
        };

        close |= body_failed || self.shutdown.is_cancelled();

        match response_result {
            Ok(response) => self.do_send_response(response, head_request, close).await,
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "handle request error");
                self.do_send_response(error_response(StatusCode::INTERNAL_SERVER_ERROR), head_request, close).await
            }
        }
    }

    async fn do_send_response<T>(&mut self, response: Response<T>, head_request: bool, close: bool) -> Result<SentResponse, HttpError>
    where
        T: Body<Data = Bytes> + Unpin,
        T::Error: Display,
    {
        let (mut parts, mut body) = response.into_parts();

        let upgrade = match parts.status {
            StatusCode::SWITCHING_PROTOCOLS => parts.extensions.remove::<OnUpgrade>(),
            _ => None,
        };

        let close = upgrade.is_none() && (close || connection_has_token(&parts.headers, "close"));
        if close {
            parts.headers.insert(CONNECTION, CLOSE);
        }

        let payload_size = PayloadSize::from(body.size_hint());
        self.framed_write.encoder_mut().set_head_request(head_request);
        self.framed_write.feed(Message::<_, Bytes>::Header((ResponseHead::from_parts(parts, ()), payload_size))).await?;

        if !self.framed_write.encoder().expects_payload() {
            // head only: HEAD requests, 1xx, 204 and 304
            SinkExt::<Message<(ResponseHead, PayloadSize), Bytes>>::flush(&mut self.framed_write).await?;
            return Ok(SentResponse { close, upgrade });
        }

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

                    self.framed_write.send(Message::Payload(payload_item)).await?;
                    if !self.framed_write.encoder().expects_payload() {
                        break;
                    }
                }
                Some(Err(e)) => return Err(SendError::invalid_body(format!("resolve response body error: {e}")).into()),
                None => {
                    self.framed_write.send(Message::Payload(PayloadItem::<Bytes>::Eof)).await?;
                    break;
                }
            }
        }

        Ok(SentResponse { close, upgrade })
    }

    async fn send_bad_request(&mut self) {
        if let Err(e) = self.do_send_response(error_response(StatusCode::BAD_REQUEST), false, true).await {
            debug!(cause = %e, "can't send bad request response");
        }
    }

    async fn upgrade(mut self, on_upgrade: OnUpgrade) {
        let read_buf = self.framed_read.read_buffer_mut().split().freeze();
        let reader = self.framed_read.into_inner().into_inner();
        let writer = self.framed_write.into_inner();

        debug!(buffered = read_buf.len(), "connection upgraded");
        on_upgrade.call(Upgraded::new(reader, writer, read_buf)).await;
    }
}

/// Waits for the next decoded item; the outer `None` means the idle timeout expired.
async fn next_message<S: Stream + Unpin>(stream: &mut S, timeout: Option<Duration>) -> Option<Option<S::Item>> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, stream.next()).await.ok(),
        None => Some(stream.next().await),
    }
}

fn expects_continue(header: &RequestHeader) -> bool {
    header.version() == Version::HTTP_11
        && header.headers().get(EXPECT).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"100-continue"))
}

fn error_response(status: StatusCode) -> Response<Full<Bytes>> {
    let reason = status.canonical_reason().unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from_static(reason.as_bytes())));
    *response.status_mut() = status;
    response
}
