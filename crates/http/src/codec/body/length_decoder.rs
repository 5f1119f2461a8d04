use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Decodes a payload framed by `Content-Length`.
///
/// Never hands out more than the bytes left of the declared length, whatever is
/// buffered behind them belongs to the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    /// The number of bytes remaining to be read from the payload
    length: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.length == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = usize::try_from(self.length).map_or(src.len(), |length| length.min(src.len()));
        let bytes = src.split_to(len).freeze();

        self.length -= bytes.len() as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_declared_length() {
        let mut buffer: BytesMut = BytesMut::from(&b"101234567890abcdef\r\n\r\n"[..]);

        let mut length_decoder = LengthDecoder::new(10);
        let payload = length_decoder.decode(&mut buffer).unwrap().unwrap();

        assert_eq!(payload.as_bytes().unwrap().as_ref(), b"1012345678");
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");

        assert!(length_decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(&buffer[..], b"90abcdef\r\n\r\n");
    }

    #[test]
    fn partial_reads_add_up() {
        let mut length_decoder = LengthDecoder::new(6);
        let mut buffer = BytesMut::from(&b"abc"[..]);

        assert_eq!(length_decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap().as_ref(), b"abc");
        assert!(length_decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"defGET");
        assert_eq!(length_decoder.decode(&mut buffer).unwrap().unwrap().as_bytes().unwrap().as_ref(), b"def");
        assert!(length_decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(&buffer[..], b"GET");
    }
}
