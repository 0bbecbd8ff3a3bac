use std::io;
use thiserror::Error;

/// Failure to turn connection bytes into a [`Request`](crate::http::Request).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The request line did not split into method, target and protocol.
    /// Empty when the stream ended before any request line arrived.
    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),
    #[error("no key/value separator in header line: {0:?}")]
    MalformedHeader(String),
    #[error("unknown request method {0:?}")]
    UnknownMethod(String),
    #[error("invalid Content-Length {0:?}")]
    InvalidContentLength(String),
    #[error("body ended after {received} of {expected} bytes")]
    ShortBody { expected: usize, received: usize },
    #[error("connection failed while reading request")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// The transport broke; nothing can be written back.
    pub fn is_transport(&self) -> bool {
        matches!(self, ProtocolError::Io(_))
    }

    /// The client closed the stream without sending a request line.
    pub fn is_empty_request(&self) -> bool {
        matches!(self, ProtocolError::MalformedRequestLine(line) if line.is_empty())
    }
}

/// Rejected route pattern.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("\"{{*}}\" must be the final segment in {0:?}")]
    VariadicNotLast(String),
    #[error("invalid parameter segment {0:?}")]
    InvalidParameter(String),
    #[error("parameter {0:?} appears more than once")]
    DuplicateParameter(String),
}

/// Failure while writing a response onto its connection.
#[derive(Debug, Error)]
pub enum RespondError {
    #[error("connection is closed")]
    ConnectionClosed,
    #[error("failed to write response")]
    Io(#[from] io::Error),
}
