//! Incremental line framing for streaming feeds.
//!
//! Both streaming framings are line oriented:
//!
//! - `continuous`: one JSON change per line, blank lines are server heartbeats
//! - `eventsource`: `data:` lines carry the JSON, `event:`/`id:`/`retry:`
//!   and `:` comment lines carry nothing a client needs
//!
//! Bytes are buffered until a `\n` arrives. Splitting happens on raw bytes
//! and text is only decoded once a whole line is available, so a chunk
//! boundary inside a multi-byte character is harmless (`\n` never occurs
//! inside a UTF-8 sequence).

use crate::error::{ProtocolError, ProtocolResult};
use crate::record::ChangeRecord;
use crate::seq::Seq;
use bytes::BytesMut;

/// Line framing of a streaming response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineFormat {
    /// Newline-delimited JSON.
    Json,
    /// Server-sent events.
    EventSource,
}

/// A decoded, non-empty line.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedLine {
    /// A document change.
    Change(ChangeRecord),
    /// End-of-response marker carrying the position to resume from.
    LastSeq(Seq),
}

/// Stateful decoder turning raw chunks into feed lines.
#[derive(Debug)]
pub struct LineDecoder {
    format: LineFormat,
    buffer: BytesMut,
    /// Prefix of `buffer` already known to contain no newline.
    scanned: usize,
}

impl LineDecoder {
    /// Creates an empty decoder.
    pub fn new(format: LineFormat) -> Self {
        Self {
            format,
            buffer: BytesMut::new(),
            scanned: 0,
        }
    }

    /// Returns the framing this decoder was built for.
    pub fn format(&self) -> LineFormat {
        self.format
    }

    /// Appends a raw chunk.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Returns the number of buffered bytes not yet consumed as lines.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Extracts the next complete line, trimmed of surrounding whitespace.
    ///
    /// Returns `None` when no newline is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let offset = self.buffer[self.scanned..]
            .iter()
            .position(|b| *b == b'\n');

        match offset {
            Some(offset) => {
                let line = self.buffer.split_to(self.scanned + offset + 1);
                self.scanned = 0;
                Some(decode_text(&line[..line.len() - 1]))
            }
            None => {
                self.scanned = self.buffer.len();
                None
            }
        }
    }

    /// Decodes the next buffered item, skipping blank and ignorable lines.
    ///
    /// Returns `None` when more bytes are needed.
    pub fn next_item(&mut self) -> Option<ProtocolResult<FeedLine>> {
        while let Some(line) = self.next_line() {
            if let Some(item) = self.decode_line(&line).transpose() {
                return Some(item);
            }
        }
        None
    }

    /// Drains whatever unterminated text remains once the body has ended.
    pub fn finish(&mut self) -> Option<ProtocolResult<FeedLine>> {
        let rest = self.buffer.split();
        self.scanned = 0;
        self.decode_line(&decode_text(&rest)).transpose()
    }

    /// Decodes one trimmed line.
    ///
    /// `Ok(None)` means the line carries nothing (blank, heartbeat, or
    /// non-data event field).
    pub fn decode_line(&self, line: &str) -> ProtocolResult<Option<FeedLine>> {
        let payload = match self.format {
            LineFormat::Json => Some(line),
            LineFormat::EventSource => event_payload(line),
        };

        match payload {
            Some(payload) if !payload.is_empty() => decode_payload(payload).map(Some),
            _ => Ok(None),
        }
    }
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

fn event_payload(line: &str) -> Option<&str> {
    const IGNORED: [&str; 4] = [":", "event:", "id:", "retry:"];

    if IGNORED.iter().any(|prefix| line.starts_with(prefix)) {
        return None;
    }
    Some(line.strip_prefix("data:").map_or(line, str::trim_start))
}

fn decode_payload(payload: &str) -> ProtocolResult<FeedLine> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| ProtocolError::malformed_line(payload, e))?;

    if value.get("id").is_none() {
        if let Some(last_seq) = value.get("last_seq") {
            return serde_json::from_value(last_seq.clone())
                .map(FeedLine::LastSeq)
                .map_err(|e| ProtocolError::malformed_line(payload, e));
        }
    }

    serde_json::from_value(value)
        .map(FeedLine::Change)
        .map_err(|e| ProtocolError::malformed_line(payload, e))
}
