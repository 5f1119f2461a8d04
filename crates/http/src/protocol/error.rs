use std::io;
use thiserror::Error;

/// Why a connection stopped serving.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("reading request failed: {0}")]
    Read(#[from] ParseError),

    #[error("writing response failed: {0}")]
    Write(#[from] SendError),
}

impl HttpError {
    /// The peer or the socket failed (reset, truncation, timeout), the message itself was fine.
    pub fn is_transport(&self) -> bool {
        match self {
            HttpError::Read(parse) => parse.is_transport(),
            HttpError::Write(send) => matches!(send, SendError::Io(_)),
        }
    }
}

/// Failures while decoding an incoming message.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed start line: {0}")]
    MalformedStartLine(String),

    #[error("header section is {current_size} bytes, limit is {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("more than {0} header fields")]
    TooManyHeaders(usize),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid method token")]
    InvalidMethod,

    #[error("invalid request target")]
    InvalidUri,

    #[error("ambiguous message framing: {0}")]
    InvalidFraming(String),

    #[error("broken chunked encoding: {0}")]
    ChunkFraming(String),

    #[error("invalid trailer field: {0}")]
    InvalidTrailer(String),

    #[error("invalid body: {0}")]
    InvalidBody(String),

    #[error("read timed out")]
    Timeout,

    #[error(transparent)]
    Io(io::Error),
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::TimedOut { Self::Timeout } else { Self::Io(e) }
    }
}

impl ParseError {
    pub fn malformed_start_line(reason: impl ToString) -> Self {
        Self::MalformedStartLine(reason.to_string())
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(limit: usize) -> Self {
        Self::TooManyHeaders(limit)
    }

    pub fn invalid_header(reason: impl ToString) -> Self {
        Self::InvalidHeader(reason.to_string())
    }

    pub fn invalid_framing(reason: impl ToString) -> Self {
        Self::InvalidFraming(reason.to_string())
    }

    pub fn chunk_framing(reason: impl ToString) -> Self {
        Self::ChunkFraming(reason.to_string())
    }

    pub fn invalid_trailer(reason: impl ToString) -> Self {
        Self::InvalidTrailer(reason.to_string())
    }

    pub fn invalid_body(reason: impl ToString) -> Self {
        Self::InvalidBody(reason.to_string())
    }

    pub fn io(e: impl Into<io::Error>) -> Self {
        Self::from(e.into())
    }

    /// Transport failures close the connection without an error response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout)
    }
}

/// Failures while encoding an outgoing message.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("status code {0} has no reason phrase")]
    UnknownStatus(u16),

    #[error("cannot send http version {0:?}")]
    UnsupportedVersion(http::Version),

    #[error("invalid body: {0}")]
    InvalidBody(String),

    #[error("trailers require chunked transfer encoding")]
    TrailersWithoutChunked,

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SendError {
    pub fn invalid_body(reason: impl ToString) -> Self {
        Self::InvalidBody(reason.to_string())
    }

    pub fn io(e: impl Into<io::Error>) -> Self {
        Self::Io(e.into())
    }
}
