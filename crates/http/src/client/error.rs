use std::io;

use thiserror::Error;

use crate::protocol::{ParseError, SendError};

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("agent is busy with another request or an unread response body")]
    Busy,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("request cancelled")]
    Cancelled,

    #[error("invalid uri: {reason}")]
    InvalidUri { reason: String },

    #[error("https requires the `tls` feature")]
    TlsUnsupported,

    #[error("connect error: {source}")]
    Connect { source: io::Error },

    #[error("request error: {source}")]
    Request {
        #[from]
        source: SendError,
    },

    #[error("response error: {source}")]
    Response {
        #[from]
        source: ParseError,
    },
}

impl AgentError {
    pub fn invalid_uri<S: ToString>(str: S) -> Self {
        Self::InvalidUri { reason: str.to_string() }
    }

    pub fn connect<E: Into<io::Error>>(e: E) -> Self {
        Self::Connect { source: e.into() }
    }

    /// Write failures caused by the peer going away read as a closed connection.
    pub(crate) fn from_send(e: SendError) -> Self {
        match &e {
            SendError::Io(source)
                if matches!(
                    source.kind(),
                    io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
                ) =>
            {
                Self::ConnectionClosed
            }
            _ => Self::Request { source: e },
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Response { source: ParseError::Timeout })
    }
}
