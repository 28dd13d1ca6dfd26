//! Heartbeat watchdog for streaming feeds.
//!
//! Each connection attempt gets its own request token, a child of the
//! feed's root token. The watchdog cancels only that child when the
//! connection goes quiet; stopping the feed cancels the root and with it
//! every child.

use crate::error::FeedError;
use std::future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::{sleep, Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Stall detector for one connection attempt.
#[derive(Debug)]
pub struct Watchdog {
    timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    request: CancellationToken,
}

impl Watchdog {
    /// Creates a watchdog armed from now.
    ///
    /// With `timeout == None` the watchdog never fires.
    pub fn new(timeout: Option<Duration>, request: CancellationToken) -> Self {
        Self {
            timeout,
            deadline: timeout.map(|t| Box::pin(sleep(t))),
            request,
        }
    }

    /// Returns true if this watchdog can fire.
    pub fn is_enabled(&self) -> bool {
        self.timeout.is_some()
    }

    /// Returns the stall deadline.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Pushes the deadline out by a full timeout from now.
    ///
    /// Called for every raw chunk, not only complete records.
    pub fn arm(&mut self) {
        if let (Some(timeout), Some(deadline)) = (self.timeout, self.deadline.as_mut()) {
            deadline.as_mut().reset(Instant::now() + timeout);
        }
    }

    /// Resolves once the deadline passes, after cancelling the request token.
    ///
    /// Pends forever when disabled.
    pub async fn expired(&mut self) -> FeedError {
        let (Some(timeout), Some(deadline)) = (self.timeout, self.deadline.as_mut()) else {
            return future::pending().await;
        };
        deadline.as_mut().await;

        warn!(?timeout, "heartbeat deadline elapsed, aborting request");
        self.request.cancel();
        FeedError::HeartbeatTimeout { timeout }
    }

    /// Returns the request token this watchdog guards.
    pub fn request_token(&self) -> &CancellationToken {
        &self.request
    }
}
