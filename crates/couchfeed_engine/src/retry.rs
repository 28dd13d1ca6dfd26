//! Reconnection backoff.

use crate::config::RetryConfig;
use std::time::Duration;

/// Tracks consecutive failed connection attempts.
///
/// The counter is incremented before the delay is computed, so the first
/// retry waits `2 * initial_delay` plus jitter. It goes back to zero once a
/// record is delivered.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: RetryConfig,
    retry_count: u32,
}

impl Backoff {
    /// Creates a backoff with no failures recorded.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            retry_count: 0,
        }
    }

    /// Records a failure and returns how long to wait before reconnecting.
    pub fn next_delay(&mut self) -> Duration {
        self.retry_count = self.retry_count.saturating_add(1);
        self.config.delay_for_attempt(self.retry_count)
    }

    /// Forgets all recorded failures.
    pub fn reset(&mut self) {
        self.retry_count = 0;
    }

    /// Returns the number of consecutive failures.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the backoff configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
