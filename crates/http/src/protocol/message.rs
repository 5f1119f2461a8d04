use bytes::{Buf, Bytes};
use http::HeaderMap;
use http_body::SizeHint;

/// One unit flowing through a message codec: the head, then the payload items.
///
/// The server decodes `Message<(RequestHeader, PayloadSize)>` and encodes
/// `Message<(ResponseHead, PayloadSize)>`, the client agent works the other way round.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

/// A piece of a payload stream.
///
/// Streams read as `Chunk* Trailers? Eof`, and `Trailers` only occurs with chunked framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Trailers(HeaderMap),
    Eof,
}

/// How a payload is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// `Content-Length: n`
    Length(u64),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// No payload bytes follow the head.
    Empty,
}

impl PayloadSize {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        *self == PayloadSize::Chunked
    }

    /// `Content-Length: 0` counts as empty as well.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty | PayloadSize::Length(0))
    }
}

/// Exact zero means no payload, another exact size means `Content-Length`,
/// an open range means chunked.
impl From<SizeHint> for PayloadSize {
    fn from(hint: SizeHint) -> Self {
        hint.exact().map_or(PayloadSize::Chunked, |exact| if exact == 0 { PayloadSize::Empty } else { PayloadSize::Length(exact) })
    }
}

impl From<PayloadSize> for SizeHint {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Empty => SizeHint::with_exact(0),
            PayloadSize::Length(exact) => SizeHint::with_exact(exact),
            PayloadSize::Chunked => SizeHint::default(),
        }
    }
}

impl<T, D: Buf> Message<T, D> {
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    pub fn is_payload(&self) -> bool {
        !self.is_header()
    }

    pub fn into_payload_item(self) -> Option<PayloadItem<D>> {
        if let Message::Payload(item) = self { Some(item) } else { None }
    }
}

impl<T> From<Bytes> for Message<T> {
    fn from(chunk: Bytes) -> Self {
        Message::Payload(PayloadItem::Chunk(chunk))
    }
}

impl<D: Buf> PayloadItem<D> {
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }

    pub fn is_trailers(&self) -> bool {
        matches!(self, PayloadItem::Trailers(_))
    }
}

impl PayloadItem {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        if let PayloadItem::Chunk(chunk) = self { Some(chunk) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_hint_selects_framing() {
        assert_eq!(PayloadSize::from(SizeHint::with_exact(0)), PayloadSize::Empty);
        assert_eq!(PayloadSize::from(SizeHint::with_exact(12)), PayloadSize::Length(12));
        assert_eq!(PayloadSize::from(SizeHint::new()), PayloadSize::Chunked);

        let mut bounded = SizeHint::new();
        bounded.set_lower(1);
        bounded.set_upper(10);
        assert_eq!(PayloadSize::from(bounded), PayloadSize::Chunked);
    }

    #[test]
    fn zero_length_is_empty() {
        assert!(PayloadSize::Length(0).is_empty());
        assert!(!PayloadSize::Length(1).is_empty());
        assert!(!PayloadSize::Chunked.is_empty());
    }
}
