//! HTTP/1.x message codec.
//!
//! Streaming decoders and encoders for both sides of a connection, built on
//! `tokio_util::codec`:
//!
//! - server: [`RequestDecoder`] reads requests, [`ResponseEncoder`] writes responses
//! - client: [`RequestEncoder`] writes requests, [`ResponseDecoder`] reads responses
//!
//! A message travels as one [`Message::Header`](crate::protocol::Message::Header) followed
//! by [`Message::Payload`](crate::protocol::Message::Payload) items. Head parsing lives in
//! [`header`], payload framing (fixed length and chunked with trailers) in [`body`].
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use wick_http::codec::RequestDecoder;
//! use wick_http::protocol::{Message, PayloadSize};
//!
//! let mut decoder = RequestDecoder::new();
//! let mut src = BytesMut::from("POST /items HTTP/1.1\r\ncontent-length: 2\r\n\r\nok");
//!
//! let Some(Message::Header((head, size))) = decoder.decode(&mut src).unwrap() else { panic!("head expected") };
//! assert_eq!(head.uri().path(), "/items");
//! assert_eq!(size, PayloadSize::Length(2));
//!
//! let chunk = decoder.decode(&mut src).unwrap().and_then(Message::into_payload_item).unwrap();
//! assert_eq!(chunk.as_bytes().unwrap().as_ref(), b"ok");
//! ```

pub mod body;
pub mod header;
mod request_decoder;
mod request_encoder;
mod response_decoder;
mod response_encoder;

pub use request_decoder::RequestDecoder;
pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
pub use response_encoder::ResponseEncoder;
