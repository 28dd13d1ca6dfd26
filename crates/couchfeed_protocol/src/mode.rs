//! Feed modes.

use crate::error::ProtocolError;
use crate::lines::LineFormat;
use std::fmt;
use std::str::FromStr;

/// Wire framing and interaction pattern of a changes request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedMode {
    /// One request, one JSON document, then done.
    #[default]
    Normal,
    /// Repeated single-document requests, each waiting for new changes.
    Longpoll,
    /// One long-lived response of newline-delimited JSON.
    Continuous,
    /// One long-lived response framed as server-sent events.
    EventSource,
}

impl FeedMode {
    /// Returns the value of the `feed` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedMode::Normal => "normal",
            FeedMode::Longpoll => "longpoll",
            FeedMode::Continuous => "continuous",
            FeedMode::EventSource => "eventsource",
        }
    }

    /// Returns true if a response body is one `{results, last_seq}` document.
    pub fn is_batch(&self) -> bool {
        matches!(self, FeedMode::Normal | FeedMode::Longpoll)
    }

    /// Returns the line framing for streaming modes.
    pub fn line_format(&self) -> Option<LineFormat> {
        match self {
            FeedMode::Continuous => Some(LineFormat::Json),
            FeedMode::EventSource => Some(LineFormat::EventSource),
            FeedMode::Normal | FeedMode::Longpoll => None,
        }
    }
}

impl fmt::Display for FeedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(FeedMode::Normal),
            "longpoll" => Ok(FeedMode::Longpoll),
            "continuous" => Ok(FeedMode::Continuous),
            "eventsource" => Ok(FeedMode::EventSource),
            other => Err(ProtocolError::UnknownFeedMode(other.to_string())),
        }
    }
}
