use std::io::Write;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::header::FastWrite;
use crate::protocol::{PayloadItem, SendError};

/// Encodes payload items as `Transfer-Encoding: chunked`.
///
/// Empty chunks are skipped, an empty chunk on the wire would end the body.
/// `Trailers` closes the body with the trailer section, a later `Eof` is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl Default for ChunkedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            PayloadItem::Chunk(bytes) => {
                if !bytes.has_remaining() {
                    return Ok(());
                }
                write!(FastWrite(dst), "{:X}\r\n", bytes.remaining())?;
                dst.reserve(bytes.remaining() + 2);
                dst.put(bytes);
                dst.put_slice(b"\r\n");
            }
            PayloadItem::Trailers(trailers) => {
                self.eof = true;
                dst.put_slice(b"0\r\n");
                for (name, value) in &trailers {
                    dst.put_slice(name.as_ref());
                    dst.put_slice(b": ");
                    dst.put_slice(value.as_ref());
                    dst.put_slice(b"\r\n");
                }
                dst.put_slice(b"\r\n");
            }
            PayloadItem::Eof => {
                self.eof = true;
                dst.put_slice(b"0\r\n\r\n");
            }
        }
        Ok(())
    }
}
