use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::ResponseHeaderDecoder;
use crate::protocol::trailers::declared_trailers;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseHead};

/// Client side counterpart of [`RequestDecoder`](super::RequestDecoder).
///
/// Before each response is read the decoder must be told whether it answers a `HEAD`
/// request, see [`set_head_request`](Self::set_head_request).
#[derive(Debug, Default)]
pub struct ResponseDecoder {
    header_decoder: ResponseHeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl ResponseDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set_head_request(&mut self, head_request: bool) {
        self.header_decoder.set_head_request(head_request);
    }

    /// True while the body of the last decoded head has not reached EOF.
    pub fn is_reading_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHead, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder = None;
                    Some(Message::Payload(item))
                }
                Some(item) => Some(Message::Payload(item)),
                None => None,
            };

            return Ok(message);
        }

        let Some((head, payload_size)) = self.header_decoder.decode(src)? else {
            return Ok(None);
        };

        self.payload_decoder = Some(match payload_size {
            PayloadSize::Chunked => PayloadDecoder::chunked(declared_trailers(head.headers())?),
            other => other.into(),
        });
        Ok(Some(Message::Header((head, payload_size))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ResponseEncoder;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, Response, StatusCode};
    use indoc::indoc;
    use tokio_util::codec::Encoder;

    #[test]
    fn chunked_response() {
        let mut decoder = ResponseDecoder::new();
        let mut buf = BytesMut::from(concat!(
            "HTTP/1.1 200 OK\r\n",
            "Transfer-Encoding: chunked\r\n",
            "\r\n",
            "4\r\nresp\r\n",
            "2\r\n:1\r\n",
            "0\r\n\r\n",
        ));

        let Some(Message::Header((head, payload_size))) = decoder.decode(&mut buf).unwrap() else { panic!("expected head") };
        assert_eq!(head.status(), StatusCode::OK);
        assert!(payload_size.is_chunked());

        let mut body = Vec::new();
        loop {
            match decoder.decode(&mut buf).unwrap().and_then(Message::into_payload_item).unwrap() {
                PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
                PayloadItem::Eof => break,
                PayloadItem::Trailers(_) => panic!("no trailers declared"),
            }
        }
        assert_eq!(body, b"resp:1");
        assert!(buf.is_empty());
    }

    #[test]
    fn head_response_has_no_body() {
        let mut decoder = ResponseDecoder::new();
        decoder.set_head_request(true);

        let mut buf = BytesMut::from(indoc! {r##"
        HTTP/1.1 200 OK
        Content-Length: 12

        HTTP/1.1 204 No Content

        "##});

        let Some(Message::Header((_, payload_size))) = decoder.decode(&mut buf).unwrap() else { panic!("expected head") };
        assert!(payload_size.is_empty());
        assert!(decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap().is_eof());

        decoder.set_head_request(false);
        let Some(Message::Header((head, payload_size))) = decoder.decode(&mut buf).unwrap() else { panic!("expected head") };
        assert_eq!(head.status(), StatusCode::NO_CONTENT);
        assert!(payload_size.is_empty());
    }

    #[test]
    fn interim_continue_is_skipped() {
        let mut decoder = ResponseDecoder::new();
        let mut buf = BytesMut::from("HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n");

        let Some(Message::Header((head, _))) = decoder.decode(&mut buf).unwrap() else { panic!("expected head") };
        assert_eq!(head.status(), StatusCode::CREATED);
    }

    #[test]
    fn encoded_response_decodes_back() {
        let response = Response::builder()
            .status(StatusCode::CREATED)
            .header("x-request-id", "7")
            .header("trailer", "x-sum")
            .body(())
            .unwrap();
        let mut trailers = HeaderMap::new();
        trailers.insert("x-sum", HeaderValue::from_static("42"));

        let mut encoder = ResponseEncoder::new();
        let mut wire = BytesMut::new();
        encoder.encode(Message::<_, Bytes>::Header((response, PayloadSize::Chunked)), &mut wire).unwrap();
        for chunk in ["hello ", "world"] {
            encoder.encode(Message::<(ResponseHead, PayloadSize), _>::Payload(PayloadItem::Chunk(Bytes::from_static(chunk.as_bytes()))), &mut wire).unwrap();
        }
        encoder.encode(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Trailers(trailers)), &mut wire).unwrap();
        assert!(!encoder.expects_payload());

        let mut decoder = ResponseDecoder::new();
        let Some(Message::Header((head, payload_size))) = decoder.decode(&mut wire).unwrap() else { panic!("expected head") };
        assert_eq!(head.status(), StatusCode::CREATED);
        assert_eq!(head.headers()["x-request-id"], "7");
        assert!(payload_size.is_chunked());

        let mut body = Vec::new();
        let mut decoded_trailers = None;
        loop {
            match decoder.decode(&mut wire).unwrap().and_then(Message::into_payload_item).unwrap() {
                PayloadItem::Chunk(bytes) => body.extend_from_slice(&bytes),
                PayloadItem::Trailers(trailers) => decoded_trailers = Some(trailers),
                PayloadItem::Eof => break,
            }
        }
        assert_eq!(body, b"hello world");
        assert_eq!(decoded_trailers.unwrap()["x-sum"], "42");
        assert!(!decoder.is_reading_payload());
        assert!(wire.is_empty());
    }
}
