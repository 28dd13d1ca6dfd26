//! Wire encoders for each feed framing.
//!
//! The output mirrors what a server sends, so tests can replay it through
//! a decoder or a scripted transport.

use couchfeed_protocol::{ChangeRecord, ChangesBatch, Seq};
use serde_json::json;

/// Encodes a `normal`/`longpoll` body.
pub fn encode_batch(records: &[ChangeRecord], last_seq: impl Into<Seq>) -> Vec<u8> {
    ChangesBatch::new(records.to_vec(), last_seq)
        .encode()
        .expect("batch encodes")
}

/// Encodes a `continuous` body: one JSON line per record.
pub fn encode_continuous(records: &[ChangeRecord]) -> Vec<u8> {
    let mut body = String::new();
    for record in records {
        body.push_str(&record.to_json().expect("record encodes"));
        body.push('\n');
    }
    body.into_bytes()
}

/// Encodes a `continuous` body with a blank heartbeat line before every record.
pub fn encode_continuous_with_heartbeats(records: &[ChangeRecord]) -> Vec<u8> {
    let mut body = String::new();
    for record in records {
        body.push('\n');
        body.push_str(&record.to_json().expect("record encodes"));
        body.push('\n');
    }
    body.into_bytes()
}

/// Encodes an `eventsource` body: `data:` and `id:` fields per event.
pub fn encode_eventsource(records: &[ChangeRecord]) -> Vec<u8> {
    let mut body = String::new();
    for record in records {
        body.push_str("data: ");
        body.push_str(&record.to_json().expect("record encodes"));
        body.push('\n');
        body.push_str(&format!("id: {}\n\n", record.seq));
    }
    body.into_bytes()
}

/// Encodes the line a server sends when a streaming response times out.
pub fn last_seq_line(seq: impl Into<Seq>) -> Vec<u8> {
    let seq: Seq = seq.into();
    let mut line = json!({ "last_seq": seq, "pending": 0 }).to_string();
    line.push('\n');
    line.into_bytes()
}
