use std::io;
use thiserror::Error;

use crate::wire::message::Command;

/// Errors surfaced by the wire codecs and transports.
///
/// Every variant is reported to the immediate caller of the failing
/// read/write; nothing is retried or swallowed internally, and no
/// partially-decoded value is ever returned alongside an error.
#[derive(Debug, Error)]
pub enum WireError {
    /// The stream ended before a field could be fully read.
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEndOfInput(&'static str),

    /// A non-canonical or otherwise invalid encoding was encountered.
    #[error("malformed encoding: {0}")]
    MalformedEncoding(&'static str),

    /// A declared length exceeds its sanity ceiling.
    #[error("{context}: declared length {len} exceeds limit {max}")]
    LengthOutOfBounds {
        context: &'static str,
        len: u64,
        max: u64,
    },

    /// The frame header names a different message type than expected.
    #[error("expected command {expected:?}, peer sent {actual:?}")]
    UnexpectedCommand { expected: Command, actual: Command },

    /// The peer closed the connection mid-message.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Any other transport-level failure.
    #[error("transport failure: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    /// Attaches the name of the field being read to an end-of-input error.
    ///
    /// Transports report truncation without knowing which field the codec
    /// was in the middle of; the codec layer fills that in. All other
    /// variants pass through unchanged.
    pub(crate) fn for_field(self, field: &'static str) -> Self {
        match self {
            WireError::UnexpectedEndOfInput(_) => WireError::UnexpectedEndOfInput(field),
            other => other,
        }
    }
}
