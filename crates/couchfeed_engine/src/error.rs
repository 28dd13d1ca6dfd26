//! Error types for the feed engine.

use couchfeed_protocol::ProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors that can end a changes feed.
///
/// Cancellation is not represented here: a stopped feed simply ends.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    /// The request could not be sent, or the connection failed mid-body.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("server responded {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// No bytes arrived within the heartbeat deadline.
    #[error("no data received for {timeout:?}")]
    HeartbeatTimeout {
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The response could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ProtocolError),

    /// A successful response carried no readable body.
    #[error("response has no readable body")]
    BodyUnavailable,

    /// The feed could not be constructed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FeedError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a status error.
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Returns true if a live feed should reconnect after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FeedError::InvalidConfig(_))
    }
}
