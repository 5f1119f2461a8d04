//! An asynchronous HTTP/1.1 protocol engine.
//!
//! This crate parses and serializes HTTP/1.x messages over any `AsyncRead`/`AsyncWrite`
//! pair, runs the server side keep-alive loop of a connection, and offers a client agent
//! that keeps one persistent connection to one origin.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 request and response codecs built on `httparse`
//! - Fixed length and chunked bodies, with trailer fields
//! - Keep-alive with idle timeout, request limits and `Keep-Alive` header overrides
//! - Expect-continue, `HEAD` responses and connection upgrades
//! - Read timeouts and graceful shutdown through a `CancellationToken`
//! - A single-connection client, optionally over TLS with the `tls` feature
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::{BodyExt, Full};
//! use tokio::net::TcpListener;
//! use tracing::{info, warn};
//! use wick_http::connection::HttpConnection;
//! use wick_http::handler::service_fn;
//! use wick_http::protocol::body::ReqBody;
//!
//! async fn count_bytes(request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Box<dyn std::error::Error + Send + Sync>> {
//!     let received = request.into_body().collect().await?.to_bytes();
//!     Ok(Response::new(Full::new(Bytes::from(format!("{} bytes\r\n", received.len())))))
//! }
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let handler = Arc::new(service_fn(count_bytes));
//!     info!(address = ?listener.local_addr()?, "listening");
//!
//!     loop {
//!         let (stream, remote) = listener.accept().await?;
//!         let handler = Arc::clone(&handler);
//!         tokio::spawn(async move {
//!             let (reader, writer) = stream.into_split();
//!             if let Err(e) = HttpConnection::new(reader, writer).process(handler).await {
//!                 warn!(%remote, cause = %e, "connection failed");
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`codec`]: message decoders and encoders for both sides
//! - [`protocol`]: message types, bodies, errors, keep-alive and trailer rules
//! - [`connection`]: the server side request/response loop
//! - [`handler`]: the trait a server application implements
//! - [`client`]: the single-connection client agent
//! - [`timeout`]: read timeouts for connection halves
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - Maximum header size: 8KB
//! - Maximum number of headers: 64
//!
//! # Safety
//!
//! Header values are sliced out of the read buffer without revalidation after `httparse`
//! has checked them, see `codec::header`.

pub mod client;
pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod timeout;

mod date;
mod utils;
pub(crate) use utils::ensure;
