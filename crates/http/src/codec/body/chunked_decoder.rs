//! Decoder for `Transfer-Encoding: chunked` payloads.
//!
//! ```text
//! chunked-body   = *chunk last-chunk trailer-section CRLF
//! chunk          = chunk-size [ chunk-ext ] CRLF chunk-data CRLF
//! last-chunk     = 1*("0") [ chunk-ext ] CRLF
//! ```
//!
//! The size line is walked byte by byte through [`ChunkedState`]; the trailer section is
//! parsed in one go with the header grammar once it is complete.

use std::io;
use std::io::ErrorKind;
use std::task::Poll;

use bytes::{Buf, Bytes, BytesMut};
use http::{HeaderMap, HeaderName, HeaderValue};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::{Body, BodyCr, BodyLf, End, Extension, Size, SizeLf, SizeLws, SizeStart, Trailers};

use crate::codec::header::{MAX_HEADER_BYTES, MAX_HEADER_NUM};
use crate::ensure;
use crate::protocol::trailers::is_prohibited_trailer;
use crate::protocol::{ParseError, PayloadItem};

/// A decoder for HTTP chunked transfer encoding.
///
/// Trailer fields are only surfaced when the message announced them with a `Trailer`
/// header; an announced message may only carry the announced fields. Without an
/// announcement the trailer section is read and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining_size: u64,
    declared_trailers: Vec<HeaderName>,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self::with_trailers(Vec::new())
    }

    /// A decoder for a message whose `Trailer` header announced `declared_trailers`.
    pub fn with_trailers(declared_trailers: Vec<HeaderName>) -> Self {
        Self { state: SizeStart, remaining_size: 0, declared_trailers }
    }

    fn decode_trailers(&mut self, src: &mut BytesMut) -> Result<Option<HeaderMap>, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];

        let (consumed, trailers) = match httparse::parse_headers(&src[..], &mut headers) {
            Ok(Status::Complete((consumed, parsed))) => {
                let mut trailers = HeaderMap::with_capacity(parsed.len());
                for header in parsed {
                    let name = HeaderName::from_bytes(header.name.as_bytes()).map_err(ParseError::invalid_trailer)?;
                    let value = HeaderValue::from_bytes(header.value).map_err(ParseError::invalid_trailer)?;
                    trailers.append(name, value);
                }
                (consumed, trailers)
            }
            Ok(Status::Partial) => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::invalid_trailer("trailer section too large"));
                return Ok(None);
            }
            Err(e) => return Err(ParseError::invalid_trailer(e)),
        };
        src.advance(consumed);

        for name in trailers.keys() {
            ensure!(!is_prohibited_trailer(name), ParseError::invalid_trailer(format!("{name} is not allowed as a trailer")));
            ensure!(
                self.declared_trailers.contains(name),
                ParseError::invalid_trailer(format!("{name} was not declared in the trailer header"))
            );
        }

        Ok(Some(trailers))
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the first hex digit of the chunk size
    SizeStart,
    /// Read the rest of the chunk size in hex
    Size,
    /// Handle whitespace after size
    SizeLws,
    /// Skip chunk extensions
    Extension,
    /// Read LF after chunk size
    SizeLf,
    /// Read chunk data
    Body,
    /// Read CR after chunk data
    BodyCr,
    /// Read LF after chunk data
    BodyLf,
    /// Read the trailer section, ends with an empty line
    Trailers,
    /// Final state after the trailer section
    End,
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }
                Trailers if self.declared_trailers.is_empty() => {
                    if !ChunkedDecoder::skip_trailers(src)? {
                        return Ok(None);
                    }
                    self.state = End;
                    continue;
                }
                Trailers => {
                    let Some(trailers) = self.decode_trailers(src)? else {
                        return Ok(None);
                    };
                    self.state = End;
                    if trailers.is_empty() {
                        continue;
                    }
                    return Ok(Some(PayloadItem::Trailers(trailers)));
                }
                _ => {}
            }

            if src.is_empty() {
                // need more data
                return Ok(None);
            }

            let mut buf = None;

            self.state = match self.state.step(src, &mut self.remaining_size, &mut buf) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(ParseError::chunk_framing(e)),
            };

            if let Some(bytes) = buf {
                trace!(len = bytes.len(), "read chunked bytes");
                return Ok(Some(PayloadItem::Chunk(bytes)));
            }
        }
    }
}

impl ChunkedDecoder {
    /// Reads an unannounced trailer section, only its syntax is checked.
    /// Returns false while the section is incomplete.
    fn skip_trailers(src: &mut BytesMut) -> Result<bool, ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADER_NUM];
        let consumed = match httparse::parse_headers(&src[..], &mut headers) {
            Ok(Status::Complete((consumed, parsed))) => {
                if !parsed.is_empty() {
                    trace!(fields = parsed.len(), "dropped undeclared trailer section");
                }
                consumed
            }
            Ok(Status::Partial) => {
                ensure!(src.len() <= MAX_HEADER_BYTES, ParseError::invalid_trailer("trailer section too large"));
                return Ok(false);
            }
            Err(e) => return Err(ParseError::invalid_trailer(e)),
        };
        src.advance(consumed);
        Ok(true)
    }
}

macro_rules! try_next_byte {
    ($src:ident) => {{
        if $src.is_empty() {
            return Poll::Pending;
        }
        $src.get_u8()
    }};
}

fn invalid(reason: &'static str) -> Poll<Result<ChunkedState, io::Error>> {
    Poll::Ready(Err(io::Error::new(ErrorKind::InvalidInput, reason)))
}

impl ChunkedState {
    fn step(&self, src: &mut BytesMut, remaining_size: &mut u64, buf: &mut Option<Bytes>) -> Poll<Result<ChunkedState, io::Error>> {
        match self {
            SizeStart => ChunkedState::read_size_start(src, remaining_size),
            Size => ChunkedState::read_size(src, remaining_size),
            SizeLws => ChunkedState::read_size_lws(src),
            Extension => ChunkedState::read_extension(src),
            SizeLf => ChunkedState::read_size_lf(src, *remaining_size),
            Body => ChunkedState::read_body(src, remaining_size, buf),
            BodyCr => ChunkedState::read_body_cr(src),
            BodyLf => ChunkedState::read_body_lf(src),
            Trailers => Poll::Ready(Ok(Trailers)),
            End => Poll::Ready(Ok(End)),
        }
    }

    fn hex_value(b: u8) -> Option<u64> {
        match b {
            b'0'..=b'9' => Some(u64::from(b - b'0')),
            b'a'..=b'f' => Some(u64::from(b + 10 - b'a')),
            b'A'..=b'F' => Some(u64::from(b + 10 - b'A')),
            _ => None,
        }
    }

    fn push_digit(size_per_chunk: &mut u64, digit: u64) -> Poll<Result<ChunkedState, io::Error>> {
        match size_per_chunk.checked_mul(16).and_then(|size| size.checked_add(digit)) {
            Some(size) => {
                *size_per_chunk = size;
                Poll::Ready(Ok(Size))
            }
            None => invalid("invalid overflow chunked length"),
        }
    }

    /// A size line must start with a hex digit.
    fn read_size_start(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, io::Error>> {
        let b = try_next_byte!(src);
        match ChunkedState::hex_value(b) {
            Some(digit) => {
                *size_per_chunk = 0;
                ChunkedState::push_digit(size_per_chunk, digit)
            }
            None => invalid("invalid chunk size line: missing size"),
        }
    }

    /// - hex digit: stay in Size
    /// - tab/space: SizeLws
    /// - semicolon: Extension
    /// - CR: SizeLf
    fn read_size(src: &mut BytesMut, size_per_chunk: &mut u64) -> Poll<Result<ChunkedState, io::Error>> {
        let b = try_next_byte!(src);
        if let Some(digit) = ChunkedState::hex_value(b) {
            return ChunkedState::push_digit(size_per_chunk, digit);
        }

        match b {
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => invalid("invalid chunk size line: Invalid Size"),
        }
    }

    fn read_size_lws(src: &mut BytesMut) -> Poll<Result<ChunkedState, io::Error>> {
        match try_next_byte!(src) {
            // LWS can follow the chunk size, but no more digits can come
            b'\t' | b' ' => Poll::Ready(Ok(SizeLws)),
            b';' => Poll::Ready(Ok(Extension)),
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ => invalid("invalid chunk size linear white space"),
        }
    }

    /// Extensions are ignored up to the CRLF, a bare LF inside one is rejected.
    fn read_extension(src: &mut BytesMut) -> Poll<Result<ChunkedState, io::Error>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            b'\n' => invalid("invalid chunk extension contains newline"),
            _ => Poll::Ready(Ok(Extension)),
        }
    }

    fn read_size_lf(src: &mut BytesMut, size_per_chunk: u64) -> Poll<Result<ChunkedState, io::Error>> {
        match try_next_byte!(src) {
            b'\n' if size_per_chunk == 0 => Poll::Ready(Ok(Trailers)),
            b'\n' => Poll::Ready(Ok(Body)),
            _ => invalid("invalid chunk size LF"),
        }
    }

    /// Hands out at most the bytes left in the current chunk.
    fn read_body(src: &mut BytesMut, size_per_chunk: &mut u64, buf: &mut Option<Bytes>) -> Poll<Result<ChunkedState, io::Error>> {
        if src.is_empty() {
            return Poll::Ready(Ok(Body));
        }

        if *size_per_chunk == 0 {
            return Poll::Ready(Ok(BodyCr));
        }

        let read_size = usize::try_from(*size_per_chunk).map_or(src.len(), |remaining| remaining.min(src.len()));

        *size_per_chunk -= read_size as u64;
        *buf = Some(src.split_to(read_size).freeze());

        if *size_per_chunk > 0 { Poll::Ready(Ok(Body)) } else { Poll::Ready(Ok(BodyCr)) }
    }

    fn read_body_cr(src: &mut BytesMut) -> Poll<Result<ChunkedState, io::Error>> {
        match try_next_byte!(src) {
            b'\r' => Poll::Ready(Ok(BodyLf)),
            _ => invalid("invalid chunk body CR"),
        }
    }

    fn read_body_lf(src: &mut BytesMut) -> Poll<Result<ChunkedState, io::Error>> {
        match try_next_byte!(src) {
            b'\n' => Poll::Ready(Ok(SizeStart)),
            _ => invalid("invalid chunk body LF"),
        }
    }
}
