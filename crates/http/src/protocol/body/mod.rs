//! Request and response body streaming.
//!
//! The connection reads the socket, the handler reads the body. [`ReqBody`] is the handler
//! side and implements `http_body::Body`; [`ReqBodySender`] is the connection side and pulls
//! payload items out of the decoder whenever the body asks for one. After the handler is
//! done the sender drains whatever was left unread, so the next request starts exactly at
//! its first byte.
//!
//! Both bodies of this crate ([`ReqBody`] and the client's `ClientBody`) also offer a plain
//! `read(&mut [u8])` and `finalize()` on top of the frame interface.

mod reader;
mod req_body;

pub(crate) use reader::{BufferedBody, drain_body, read_body};
pub use req_body::{ReqBody, ReqBodySender};
