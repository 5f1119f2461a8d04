//! Routing features in one server: middleware with typed extensions, prefix sub-routers,
//! regex routes, streamed bodies with trailers, an error handler and a WebSocket echo.
//!
//! ```text
//! curl -i localhost:3000/api/users/42 -H 'authorization: demo'
//! curl -i localhost:3000/api/stream -H 'authorization: demo'
//! curl -i localhost:3000/api/missing -H 'authorization: demo'
//! ```

use std::time::Instant;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::BoxFuture;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, StatusCode};
use http_body::Frame;
use http_body_util::StreamBody;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, info_span, warn};
use tracing_subscriber::FmtSubscriber;
use wick_http::connection::Upgraded;
use wick_web::router::matcher::Pattern;
use wick_web::{Chain, HandlerResult, ResponseBody, Router, Server, ServerConfig, ServerRequest, handler_fn};

#[derive(Debug, Clone)]
struct Caller(String);

#[derive(Debug, Clone, Copy)]
struct Started(Instant);

async fn start_timer(req: &mut ServerRequest) -> HandlerResult {
    req.extensions_mut().insert(Started(Instant::now()));
    Ok(())
}

async fn authenticate(req: &mut ServerRequest) -> HandlerResult {
    match req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(token) => {
            let caller = Caller(token.to_owned());
            req.extensions_mut().insert(caller);
        }
        None => req.respond((StatusCode::UNAUTHORIZED, "missing authorization"))?,
    }
    Ok(())
}

async fn user(req: &mut ServerRequest) -> HandlerResult {
    let id = req.params().name("id").unwrap_or_default();
    let caller = req.extensions().get::<Caller>().map_or("anonymous", |c| c.0.as_str());
    let text = format!("user {id}, asked by {caller}\n");
    req.respond(text)?;
    Ok(())
}

async fn stream(req: &mut ServerRequest) -> HandlerResult {
    let chunks = (1..=3).map(|i| Ok::<_, std::io::Error>(Frame::data(Bytes::from(format!("chunk {i}\n")))));
    let body = ResponseBody::stream(StreamBody::new(futures::stream::iter(chunks)));
    let body = ResponseBody::with_trailers(body, || {
        let mut trailers = HeaderMap::new();
        trailers.insert("x-chunks", HeaderValue::from_static("3"));
        trailers
    });

    let mut response = http::Response::new(body);
    response.headers_mut().insert("trailer", HeaderValue::from_static("x-chunks"));
    req.respond(response)?;
    Ok(())
}

async fn echo_body(req: &mut ServerRequest) -> HandlerResult {
    let mut body = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let read = req.body_mut().read(&mut buf).await?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&buf[..read]);
    }
    req.respond(Bytes::from(body))?;
    Ok(())
}

async fn on_error(req: &mut ServerRequest) -> HandlerResult {
    let message = req.failure().map(ToString::to_string).unwrap_or_default();
    warn!(path = req.path(), %message, "request failed");
    req.respond((StatusCode::NOT_FOUND, format!("{message}\n")))?;
    Ok(())
}

async fn log_request(req: &mut ServerRequest) -> HandlerResult {
    let elapsed = req.extensions().get::<Started>().map(|s| s.0.elapsed());
    let status = req.response().map(http::Response::status);
    info!(method = %req.method(), path = req.path(), ?status, ?elapsed, "request finished");
    Ok(())
}

fn websocket_echo(upgraded: Upgraded) -> BoxFuture<'static, ()> {
    async move {
        // raw bytes are echoed back, frame decoding is left to the application
        let (mut reader, mut writer, buffered) = upgraded.into_parts();
        if writer.write_all(&buffered).await.is_err() {
            return;
        }
        let mut buf = [0u8; 4096];
        while let Ok(read) = reader.read(&mut buf).await {
            if read == 0 || writer.write_all(&buf[..read]).await.is_err() {
                break;
            }
        }
        debug!("websocket closed");
    }
    .boxed()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let api = Router::builder()
        .middleware(handler_fn(authenticate))
        .get(Pattern::regex(r"^/users/(?P<id>\d+)$")?, handler_fn(user))
        .get("/stream", handler_fn(stream))
        .post("/echo", handler_fn(echo_body))
        .build();

    let router = Router::builder()
        .middleware(handler_fn(start_timer))
        .prefix("/api", api)
        .upgrade("/ws", Chain::new(), websocket_echo)
        .on_error(handler_fn(on_error))
        .finalizer(handler_fn(log_request))
        .build();

    let config: ServerConfig = serde_json::from_str(r#"{ "read_timeout_ms": 30000, "max_requests": 1000 }"#)?;
    let server = Server::builder().router(router).config(config).span(info_span!("demo")).build()?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    server.serve(listener, shutdown).await?;
    Ok(())
}
