//! Server side connection handling.
//!
//! [`HttpConnection`] runs the request/response loop of one connection: it decodes a
//! request, hands it to a [`Handler`](crate::handler::Handler) while streaming the body on
//! demand, writes the response, drains what the handler left unread and decides whether
//! the connection lives on. [`ConnectionConfig`] carries its timeouts and limits.

mod config;
mod http_connection;
mod upgrade;

pub use config::{ConnectionConfig, DEFAULT_KEEP_ALIVE_TIMEOUT, DEFAULT_READ_BUFFER_SIZE};
pub use http_connection::HttpConnection;
pub use upgrade::{OnUpgrade, Upgraded};
