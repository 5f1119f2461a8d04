//! Streaming request decoder.
//!
//! [`RequestDecoder`] yields one [`Message::Header`] per request followed by the
//! [`Message::Payload`] items of its body, ending with [`PayloadItem::Eof`]. The decoder
//! never reads past the end of the current body, so the next head is decoded from the
//! exact byte that follows it.
//!
//! ```no_run
//! use wick_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//! use bytes::BytesMut;
//!
//! let mut decoder = RequestDecoder::new();
//! let mut buffer = BytesMut::from(&b"GET / HTTP/1.1\r\nhost: localhost\r\n\r\n"[..]);
//! let result = decoder.decode(&mut buffer);
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::RequestHeaderDecoder;
use crate::protocol::trailers::declared_trailers;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, RequestHeader};

/// A decoder for HTTP requests that handles both headers and payload
///
/// The decoder maintains its state through the `payload_decoder` field:
/// - `None`: Currently parsing headers
/// - `Some(PayloadDecoder)`: Currently parsing payload
#[derive(Debug, Default)]
pub struct RequestDecoder {
    header_decoder: RequestHeaderDecoder,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// True while the body of the last decoded head has not reached EOF.
    pub fn is_reading_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHeader, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // parse payload if have payload_decoder
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Eof) => {
                    // no need payload decoder in this request now
                    self.payload_decoder = None;
                    Some(Message::Payload(item))
                }
                Some(item) => Some(Message::Payload(item)),
                None => None,
            };

            return Ok(message);
        }

        let Some((header, payload_size)) = self.header_decoder.decode(src)? else {
            return Ok(None);
        };

        self.payload_decoder = Some(match payload_size {
            PayloadSize::Chunked => PayloadDecoder::chunked(declared_trailers(header.headers())?),
            other => other.into(),
        });
        Ok(Some(Message::Header((header, payload_size))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RequestEncoder;
    use bytes::Bytes;
    use http::Request;
    use indoc::indoc;
    use tokio_util::codec::Encoder;

    fn decode_all(input: &str) -> Vec<Message<(RequestHeader, PayloadSize)>> {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from(input);
        let mut messages = Vec::new();
        while let Some(message) = decoder.decode(&mut buf).unwrap() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn get_then_post_on_one_buffer() {
        let input = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080

        POST /submit HTTP/1.1
        Content-Length: 5

        hello"##};

        let messages = decode_all(input);
        assert_eq!(messages.len(), 5);

        let Message::Header((header, payload_size)) = &messages[0] else { panic!("expected header") };
        assert_eq!(header.uri().path(), "/index.html");
        assert!(payload_size.is_empty());
        assert!(matches!(messages[1], Message::Payload(PayloadItem::Eof)));

        let Message::Header((header, payload_size)) = &messages[2] else { panic!("expected header") };
        assert_eq!(header.method(), http::Method::POST);
        assert_eq!(*payload_size, PayloadSize::Length(5));
        assert!(matches!(&messages[3], Message::Payload(PayloadItem::Chunk(bytes)) if bytes == &Bytes::from_static(b"hello")));
        assert!(matches!(messages[4], Message::Payload(PayloadItem::Eof)));
    }

    #[test]
    fn get_with_content_length_is_framed() {
        let messages = decode_all("GET / HTTP/1.1\r\nContent-Length: 3\r\n\r\nabcGET /next HTTP/1.1\r\n\r\n");

        assert!(matches!(&messages[1], Message::Payload(PayloadItem::Chunk(bytes)) if &bytes[..] == b"abc"));
        assert!(matches!(messages[2], Message::Payload(PayloadItem::Eof)));
        let Message::Header((header, _)) = &messages[3] else { panic!("expected header") };
        assert_eq!(header.uri().path(), "/next");
    }

    #[test]
    fn declared_trailers_are_surfaced() {
        let input = concat!(
            "POST /t HTTP/1.1\r\n",
            "Transfer-Encoding: chunked\r\n",
            "Trailer: X-Checksum\r\n",
            "\r\n",
            "3\r\nabc\r\n",
            "0\r\n",
            "X-Checksum: 42\r\n",
            "\r\n",
        );

        let messages = decode_all(input);
        let trailers = messages
            .iter()
            .find_map(|message| match message {
                Message::Payload(PayloadItem::Trailers(trailers)) => Some(trailers),
                _ => None,
            })
            .unwrap();
        assert_eq!(trailers["x-checksum"], "42");
        assert!(matches!(messages.last(), Some(Message::Payload(PayloadItem::Eof))));
    }

    #[test]
    fn prohibited_trailer_declaration_is_rejected() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\nTrailer: Content-Length\r\n\r\n");
        assert!(matches!(decoder.decode(&mut buf), Err(ParseError::InvalidTrailer { .. })));
    }

    #[test]
    fn partial_body_waits_for_more_bytes() {
        let mut decoder = RequestDecoder::new();
        let mut buf = BytesMut::from("PUT / HTTP/1.1\r\nContent-Length: 4\r\n\r\nab");

        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_header());
        assert!(decoder.decode(&mut buf).unwrap().unwrap().is_payload());
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        assert!(decoder.is_reading_payload());

        buf.extend_from_slice(b"cd");
        assert!(decoder.decode(&mut buf).unwrap().is_some());
        assert!(decoder.decode(&mut buf).unwrap().unwrap().into_payload_item().unwrap().is_eof());
        assert!(!decoder.is_reading_payload());
    }

    #[test]
    fn encoded_requests_decode_back() {
        let mut encoder = RequestEncoder::new();
        let mut wire = BytesMut::new();

        let post = Request::post("/submit?draft=1").header("host", "localhost").header("x-tag", "a").body(()).unwrap();
        encoder.encode(Message::<_, Bytes>::Header((RequestHeader::from(post), PayloadSize::Length(7))), &mut wire).unwrap();
        encoder.encode(Message::<(RequestHeader, PayloadSize), _>::Payload(PayloadItem::Chunk(Bytes::from_static(b"payload"))), &mut wire).unwrap();
        encoder.encode(Message::<(RequestHeader, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut wire).unwrap();

        let get = Request::get("/next").header("host", "localhost").body(()).unwrap();
        encoder.encode(Message::<_, Bytes>::Header((RequestHeader::from(get), PayloadSize::Empty)), &mut wire).unwrap();

        let messages = decode_all(std::str::from_utf8(&wire).unwrap());
        assert_eq!(messages.len(), 5);

        let Message::Header((header, payload_size)) = &messages[0] else { panic!("expected header") };
        assert_eq!(header.method(), http::Method::POST);
        assert_eq!(header.uri(), "/submit?draft=1");
        assert_eq!(header.headers()["x-tag"], "a");
        assert_eq!(*payload_size, PayloadSize::Length(7));
        assert!(matches!(&messages[1], Message::Payload(PayloadItem::Chunk(bytes)) if &bytes[..] == b"payload"));
        assert!(matches!(messages[2], Message::Payload(PayloadItem::Eof)));

        let Message::Header((header, payload_size)) = &messages[3] else { panic!("expected header") };
        assert_eq!(header.method(), http::Method::GET);
        assert_eq!(header.uri().path(), "/next");
        assert!(payload_size.is_empty());
        assert!(matches!(messages[4], Message::Payload(PayloadItem::Eof)));
    }
}
