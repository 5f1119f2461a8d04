//! Protocol types shared by the codec, the connection and the client.
//!
//! - **Messages** ([`Message`], [`PayloadItem`], [`PayloadSize`]): a message travels as a
//!   head followed by payload items; the payload size records the framing chosen for it
//! - **Heads** ([`RequestHeader`], [`ResponseHead`])
//! - **Bodies** ([`body`]): the server side request body and its connection side sender
//! - **Errors** ([`HttpError`], [`ParseError`], [`SendError`])
//! - **Connection rules** ([`keep_alive`]) and **trailer fields** ([`trailers`])

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;

pub mod body;
pub mod keep_alive;
pub mod trailers;

pub use trailers::merge_trailers;
