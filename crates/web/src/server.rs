use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Request, Response, StatusCode};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use wick_http::connection::{ConnectionConfig, HttpConnection};
use wick_http::handler::Handler;
use wick_http::protocol::body::ReqBody;

use crate::body::ResponseBody;
use crate::handler::HandlerError;
use crate::request::ServerRequest;
use crate::router::{Router, RoutingError};

#[derive(Debug)]
pub struct ServerBuilder {
    router: Option<Router>,
    config: ConnectionConfig,
    span: Option<Span>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { router: None, config: ConnectionConfig::default(), span: None }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Accepts a [`ConnectionConfig`] or a deserialized [`ServerConfig`](crate::ServerConfig).
    pub fn config(mut self, config: impl Into<ConnectionConfig>) -> Self {
        self.config = config.into();
        self
    }

    /// Parent span of the connection spans, defaults to the span current at `build`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let span = self.span.unwrap_or_else(Span::current);
        Ok(Server { router, config: self.config, span })
    }
}

/// Serves a [`Router`] over TCP, one task per connection.
#[derive(Debug)]
pub struct Server {
    router: Router,
    config: ConnectionConfig,
    span: Span,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Accepts connections from `listener` until `shutdown` is cancelled, then waits for
    /// the open connections to finish their current request.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> io::Result<()> {
        info!(parent: &self.span, address = ?listener.local_addr()?, "start listening");

        let server = Arc::new(self);
        let tracker = TaskTracker::new();

        loop {
            let (tcp_stream, remote_addr) = select! {
                () = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(parent: &server.span, cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            if let Err(e) = tcp_stream.set_nodelay(true) {
                debug!(parent: &server.span, cause = %e, "failed to set TCP_NODELAY");
            }

            let span = info_span!(parent: &server.span, "connection", remote = %remote_addr);
            let handler = Arc::clone(&server);
            let shutdown = shutdown.child_token();

            tracker.spawn(
                async move {
                    let (reader, writer) = tcp_stream.into_split();
                    let connection = HttpConnection::with_config(reader, writer, handler.config.clone()).with_shutdown(shutdown);
                    match connection.process(handler).await {
                        Ok(()) => debug!("connection closed"),
                        Err(e) if e.is_transport() => debug!(cause = %e, "connection lost"),
                        Err(e) => warn!(cause = %e, "connection closed on error"),
                    }
                }
                .instrument(span),
            );
        }

        tracker.close();
        info!(parent: &server.span, connections = tracker.len(), "shutting down");
        tracker.wait().await;
        Ok(())
    }
}

#[async_trait]
impl Handler for Server {
    type RespBody = ResponseBody;
    type Error = HandlerError;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        let mut request = ServerRequest::from(req);
        let result = self.router.handle_route("", &mut request).await;

        if let Some(response) = request.take_response() {
            if let Err(e) = result {
                warn!(cause = %e, "request failed after it was responded");
            }
            return Ok(response);
        }

        let status = match result {
            Err(e) => match e.downcast_ref::<RoutingError>() {
                Some(routing) => {
                    debug!(path = %routing.path, status = %routing.status, "no route");
                    routing.status
                }
                None => {
                    error!(cause = %e, path = request.path(), "request failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Ok(()) => StatusCode::NOT_FOUND,
        };

        Ok(fallback_response(status))
    }
}

fn fallback_response(status: StatusCode) -> Response<ResponseBody> {
    let reason = status.canonical_reason().unwrap_or_default();
    let mut response = Response::new(ResponseBody::once(Bytes::from_static(reason.as_bytes())));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerResult, handler_fn};
    use http_body_util::BodyExt;

    async fn hello(req: &mut ServerRequest) -> HandlerResult {
        req.respond("hello")?;
        Ok(())
    }

    async fn fail(_req: &mut ServerRequest) -> HandlerResult {
        Err("boom".into())
    }

    fn server() -> Server {
        let router = Router::builder().get("/hello", handler_fn(hello)).get("/fail", handler_fn(fail)).build();
        Server::builder().router(router).build().unwrap()
    }

    async fn call(server: &Server, uri: &str) -> (StatusCode, String) {
        let response = server.call(Request::builder().uri(uri).body(ReqBody::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn router_is_required() {
        let result = Server::builder().build();
        assert!(result.is_err_and(|e| matches!(e, ServerBuildError::MissingRouter)));
    }

    #[tokio::test]
    async fn routed_response_is_returned() {
        assert_eq!(call(&server(), "/hello").await, (StatusCode::OK, "hello".to_owned()));
    }

    #[tokio::test]
    async fn fallback_for_missing_route_is_404() {
        assert_eq!(call(&server(), "/nowhere").await, (StatusCode::NOT_FOUND, "Not Found".to_owned()));
    }

    #[tokio::test]
    async fn fallback_for_failed_handler_is_500() {
        assert_eq!(call(&server(), "/fail").await, (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_owned()));
    }
}
