//! # couchfeed engine
//!
//! Resumable client for a database changes feed.
//!
//! This crate provides:
//! - Request construction (query parameters, POST bodies, Basic auth)
//! - The feed state machine (idle → connecting → streaming → stopped)
//! - A heartbeat watchdog for `continuous` and `eventsource` feeds
//! - Reconnection with capped exponential backoff and jitter
//! - A pull-based public surface with cooperative cancellation
//! - An HTTP transport abstraction, a reqwest implementation and a
//!   scripted mock for tests
//!
//! ## Key Invariants
//!
//! - Records are yielded in wire order; requests are strictly sequential
//! - The resume cursor only moves forward and always seeds the next request
//! - No record already yielded is requested again after a reconnect
//! - A stopped feed issues no further requests and holds no timers
//! - Cancellation ends the feed; it is never reported as an error

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod feed;
#[cfg(feature = "reqwest")]
mod http;
mod request;
mod retry;
mod state;
mod transport;
mod watchdog;

pub use config::{FeedOptions, Heartbeat, RetryConfig, Style, DEFAULT_HEARTBEAT};
pub use error::{FeedError, FeedResult};
pub use feed::{ChangesFeed, StopHandle};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use request::RequestBuilder;
pub use retry::Backoff;
pub use state::{FeedState, FeedStats};
pub use transport::{
    ByteStream, FeedRequest, FeedResponse, HttpClient, Method, MockChunk, MockClient, MockReply,
};
pub use watchdog::Watchdog;

pub use couchfeed_protocol::{ChangeRecord, FeedMode, Seq};
pub use tokio_util::sync::CancellationToken;
