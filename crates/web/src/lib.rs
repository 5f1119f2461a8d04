//! A router and TCP server on top of `wick-http`.
//!
//! Routes are matched with a longest and nearest rule: among all patterns matching the
//! path, the one starting earliest wins, then the longest one. Handlers are plain async
//! functions taking the request context and answering through
//! [`ServerRequest::respond`].
//!
//! ```no_run
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use wick_web::router::matcher::Pattern;
//! use wick_web::{HandlerResult, Router, Server, ServerRequest, handler_fn};
//!
//! async fn hello(req: &mut ServerRequest) -> HandlerResult {
//!     req.respond("hello world")?;
//!     Ok(())
//! }
//!
//! async fn user(req: &mut ServerRequest) -> HandlerResult {
//!     let id = req.params().name("id").unwrap_or_default().to_owned();
//!     req.respond(format!("user {id}"))?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::builder()
//!         .get("/", handler_fn(hello))
//!         .get(Pattern::regex(r"^/users/(?P<id>\d+)$")?, handler_fn(user))
//!         .build();
//!
//!     let server = Server::builder().router(router).build()?;
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     server.serve(listener, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

mod body;
mod config;
mod handler;
mod request;
mod responder;
mod server;

pub mod router;

pub use body::ResponseBody;
pub use config::ServerConfig;
pub use handler::{AsyncHandlerFn, FnHandler, HandlerError, HandlerResult, RequestHandler, handler_fn};
pub use request::{BodyMut, RespondError, RouteParams, ServerRequest};
pub use responder::Responder;
pub use router::{Chain, ChainItem, Router, RouterBuilder, RoutingError};
pub use server::{Server, ServerBuildError, ServerBuilder};
