use bytes::BytesMut;
use http::HeaderName;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// Body framing of an incoming message, as announced by its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadDecoder {
    Length(LengthDecoder),
    Chunked(ChunkedDecoder),
    /// Yields `Eof` straight away.
    Bodiless,
}

impl PayloadDecoder {
    /// Chunked framing that keeps the trailer fields named in `declared_trailers`.
    pub fn chunked(declared_trailers: Vec<HeaderName>) -> Self {
        Self::Chunked(ChunkedDecoder::with_trailers(declared_trailers))
    }
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Empty => Self::Bodiless,
            PayloadSize::Length(remaining) => Self::Length(LengthDecoder::new(remaining)),
            PayloadSize::Chunked => Self::chunked(Vec::new()),
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<PayloadItem>, ParseError> {
        match self {
            Self::Bodiless => Ok(Some(PayloadItem::Eof)),
            Self::Length(framing) => framing.decode(src),
            Self::Chunked(framing) => framing.decode(src),
        }
    }
}
