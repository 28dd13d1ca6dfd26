//! # couchfeed protocol
//!
//! Wire types and framing decoders for a database changes feed.
//!
//! This crate provides:
//! - `ChangeRecord` and the opaque `Seq` cursor token
//! - `ChangesBatch` for the single-document `normal`/`longpoll` body
//! - `LineDecoder` for the `continuous` (newline-delimited JSON) and
//!   `eventsource` (server-sent events) framings
//! - `FeedMode` for selecting a framing
//!
//! This is a pure protocol crate with no I/O operations. Decoders accept
//! raw chunks as they arrive and tolerate any chunk boundary, including
//! boundaries that split a multi-byte character.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod batch;
mod error;
mod lines;
mod mode;
mod record;
mod seq;

pub use batch::ChangesBatch;
pub use error::{ProtocolError, ProtocolResult};
pub use lines::{FeedLine, LineDecoder, LineFormat};
pub use mode::FeedMode;
pub use record::ChangeRecord;
pub use seq::Seq;
