use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::protocol::{PayloadItem, SendError};

/// Encodes a payload framed by `Content-Length`.
///
/// The body must produce exactly the announced number of bytes, anything else
/// would desynchronize the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(bytes) => {
                let size = bytes.remaining() as u64;
                if size > self.length {
                    return Err(SendError::invalid_body(format!("body exceeds content-length by {} bytes", size - self.length)));
                }
                dst.put(bytes);
                self.length -= size;
                Ok(())
            }
            PayloadItem::Trailers(_) => Err(SendError::TrailersWithoutChunked),
            PayloadItem::Eof => {
                self.eof = true;
                if self.length > 0 {
                    return Err(SendError::invalid_body(format!("body is {} bytes shorter than content-length", self.length)));
                }
                Ok(())
            }
        }
    }
}
