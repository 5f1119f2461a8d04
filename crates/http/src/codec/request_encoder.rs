use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::RequestHeaderEncoder;
use crate::protocol::{Message, PayloadSize, RequestHeader, SendError};

/// Encodes a request head followed by its payload items, used by the client.
#[derive(Debug, Default)]
pub struct RequestEncoder {
    header_encoder: RequestHeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<D: Buf> Encoder<Message<(RequestHeader, PayloadSize), D>> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(RequestHeader, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((header, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive request head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                self.header_encoder.encode((header, payload_size), dst)?;
                self.payload_encoder = Some(payload_size.into());
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect request header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let result = payload_encoder.encode(payload_item, dst);
                if result.is_err() || payload_encoder.is_finish() {
                    self.payload_encoder = None;
                }

                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PayloadItem;
    use bytes::Bytes;
    use http::Request;

    #[test]
    fn chunked_request_with_host() {
        let request = Request::post("http://example.com:8080/upload?x=1").body(()).unwrap();
        let mut encoder = RequestEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((RequestHeader::from(request), PayloadSize::Chunked)), &mut dst).unwrap();
        encoder.encode(Message::<(RequestHeader, PayloadSize), _>::Payload(PayloadItem::Chunk(Bytes::from_static(b"abc"))), &mut dst).unwrap();
        encoder.encode(Message::<(RequestHeader, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut dst).unwrap();

        let wire = String::from_utf8(dst.to_vec()).unwrap();
        assert!(wire.starts_with("POST /upload?x=1 HTTP/1.1\r\n"));
        assert!(wire.contains("host: example.com:8080\r\n"));
        assert!(wire.contains("transfer-encoding: chunked\r\n"));
        assert!(wire.ends_with("\r\n\r\n3\r\nabc\r\n0\r\n\r\n"));
    }

    #[test]
    fn get_without_body_has_no_framing() {
        let request = Request::get("/").header("host", "localhost").body(()).unwrap();
        let mut encoder = RequestEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((RequestHeader::from(request), PayloadSize::Empty)), &mut dst).unwrap();
        assert_eq!(&dst[..], b"GET / HTTP/1.1\r\nhost: localhost\r\n\r\n");
    }
}
