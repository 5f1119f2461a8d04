use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::{ResponseHeaderEncoder, status_forbids_body};
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

/// Encodes a response head followed by its payload items.
///
/// Responses to `HEAD` requests and `1xx`/`204`/`304` responses are written without a
/// payload: after their head, [`expects_payload`](Self::expects_payload) is false and the
/// caller must not send payload items.
#[derive(Debug, Default)]
pub struct ResponseEncoder {
    header_encoder: ResponseHeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
    head_request: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Tells the encoder whether the next response answers a `HEAD` request.
    pub fn set_head_request(&mut self, head_request: bool) {
        self.head_request = head_request;
    }

    pub fn expects_payload(&self) -> bool {
        self.payload_encoder.is_some()
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let has_payload = !self.head_request && !status_forbids_body(head.status());
                self.header_encoder.encode((head, payload_size), dst)?;
                if has_payload {
                    self.payload_encoder = Some(payload_size.into());
                }
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
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
    use bytes::Bytes;
    use http::{Response, StatusCode};

    fn head(status: StatusCode) -> ResponseHead {
        let mut response = Response::new(());
        *response.status_mut() = status;
        response.headers_mut().insert(http::header::DATE, "Thu, 01 Jan 1970 00:00:00 GMT".parse().unwrap());
        response
    }

    #[test]
    fn length_response() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), PayloadSize::Length(5))), &mut dst).unwrap();
        assert!(encoder.expects_payload());
        encoder.encode(Message::<(ResponseHead, PayloadSize), _>::Payload(crate::protocol::PayloadItem::Chunk(Bytes::from_static(b"hello"))), &mut dst).unwrap();
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(crate::protocol::PayloadItem::Eof), &mut dst).unwrap();
        assert!(!encoder.expects_payload());

        let wire = String::from_utf8(dst.to_vec()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("content-length: 5\r\n"));
        assert!(wire.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn head_response_keeps_length_without_payload() {
        let mut encoder = ResponseEncoder::new();
        encoder.set_head_request(true);
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::OK), PayloadSize::Length(12))), &mut dst).unwrap();
        assert!(!encoder.expects_payload());

        let wire = String::from_utf8(dst.to_vec()).unwrap();
        assert!(wire.contains("content-length: 12\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn no_content_has_no_payload() {
        let mut encoder = ResponseEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(Message::<_, Bytes>::Header((head(StatusCode::NO_CONTENT), PayloadSize::Chunked)), &mut dst).unwrap();
        assert!(!encoder.expects_payload());
        assert!(!String::from_utf8(dst.to_vec()).unwrap().contains("transfer-encoding"));
    }

    #[test]
    fn unknown_status_fails() {
        let mut encoder = ResponseEncoder::new();
        let status = StatusCode::from_u16(599).unwrap();
        let result = encoder.encode(Message::<_, Bytes>::Header((head(status), PayloadSize::Empty)), &mut BytesMut::new());
        assert!(matches!(result, Err(SendError::UnknownStatus(599))));
    }
}
