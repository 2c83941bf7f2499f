use std::io;

use thiserror::Error;

use crate::http::request::ParserState;
use crate::http::writer::WriterStage;

/// Errors raised while reading a request off the wire.
///
/// Every variant is fatal to the connection that produced it.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request line: {reason}")]
    MalformedRequestLine { reason: String },

    #[error("malformed header: {reason}")]
    MalformedHeader { reason: String },

    #[error("invalid content-length header: {value:?}")]
    InvalidContentLength { value: String },

    #[error("connection closed before the request was complete (state: {state:?})")]
    Incomplete { state: ParserState },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn malformed_request_line<S: ToString>(reason: S) -> Self {
        Self::MalformedRequestLine { reason: reason.to_string() }
    }

    pub fn malformed_header<S: ToString>(reason: S) -> Self {
        Self::MalformedHeader { reason: reason.to_string() }
    }
}

/// Errors raised by [`ResponseWriter`](crate::http::writer::ResponseWriter).
#[derive(Debug, Error)]
pub enum WriteError {
    /// A write was attempted outside the stage it belongs to.
    #[error("{call} is not allowed in stage {stage:?}")]
    Stage { call: &'static str, stage: WriterStage },

    #[error("unsupported status code {0}")]
    UnsupportedStatus(u16),

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}
