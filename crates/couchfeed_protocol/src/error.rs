//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding feed data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A non-empty line of a streaming feed was not a valid change.
    #[error("malformed change line {line:?}: {message}")]
    MalformedLine {
        /// The offending line, after framing prefixes were removed.
        line: String,
        /// Decoder message.
        message: String,
    },

    /// A `normal`/`longpoll` response body was not a valid changes document.
    #[error("malformed changes body: {message}")]
    MalformedBatch {
        /// Decoder message.
        message: String,
    },

    /// A record could not be serialized.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Encoder message.
        message: String,
    },

    /// Unknown `feed` value.
    #[error("unknown feed mode: {0:?}")]
    UnknownFeedMode(String),
}

impl ProtocolError {
    /// Create a malformed line error.
    pub fn malformed_line(line: impl Into<String>, message: impl ToString) -> Self {
        Self::MalformedLine {
            line: line.into(),
            message: message.to_string(),
        }
    }

    /// Create a malformed batch error.
    pub fn malformed_batch(message: impl ToString) -> Self {
        Self::MalformedBatch {
            message: message.to_string(),
        }
    }

    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl ToString) -> Self {
        Self::EncodingFailed {
            message: message.to_string(),
        }
    }
}
