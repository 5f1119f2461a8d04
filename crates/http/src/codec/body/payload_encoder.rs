use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{PayloadItem, PayloadSize, SendError};

/// Body framing of an outgoing message, as written into its head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadEncoder {
    Length(LengthEncoder),
    Chunked(ChunkedEncoder),
    /// Accepts nothing but empty chunks, `done` flips on `Eof`.
    Bodiless { done: bool },
}

impl PayloadEncoder {
    /// Whether the last item of the body went through, the encoder can then be dropped.
    pub fn is_finish(&self) -> bool {
        match self {
            Self::Bodiless { done } => *done,
            Self::Length(framing) => framing.is_finish(),
            Self::Chunked(framing) => framing.is_finish(),
        }
    }
}

impl From<PayloadSize> for PayloadEncoder {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Empty => Self::Bodiless { done: false },
            PayloadSize::Length(declared) => Self::Length(LengthEncoder::new(declared)),
            PayloadSize::Chunked => Self::Chunked(ChunkedEncoder::new()),
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), SendError> {
        let done = match self {
            Self::Length(framing) => return framing.encode(item, dst),
            Self::Chunked(framing) => return framing.encode(item, dst),
            Self::Bodiless { done } => done,
        };

        match item {
            PayloadItem::Eof => *done = true,
            PayloadItem::Chunk(data) if data.has_remaining() => {
                return Err(SendError::invalid_body("body data on a message without body"));
            }
            PayloadItem::Chunk(_) => {}
            PayloadItem::Trailers(_) => return Err(SendError::TrailersWithoutChunked),
        }
        Ok(())
    }
}
