//! Message head decoding and encoding.
//!
//! - [`RequestHeaderDecoder`] / [`ResponseHeaderDecoder`]: parse a head and pick the payload framing
//! - [`RequestHeaderEncoder`] / [`ResponseHeaderEncoder`]: write a head with framing headers filled in

mod header_decoder;
mod header_encoder;

pub use header_decoder::{MAX_HEADER_BYTES, MAX_HEADER_NUM, RequestHeaderDecoder, ResponseHeaderDecoder};
pub(crate) use header_encoder::{FastWrite, status_forbids_body};
pub use header_encoder::{RequestHeaderEncoder, ResponseHeaderEncoder};
