//! Configuration for a changes feed.

use couchfeed_protocol::{FeedMode, Seq};
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Default watchdog interval when heartbeat is enabled but unspecified.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(60_000);

/// Minimum grace added on top of the heartbeat interval.
const MIN_HEARTBEAT_GRACE: Duration = Duration::from_millis(1_000);

/// Heartbeat behavior for streaming feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Heartbeat {
    /// Watchdog on with [`DEFAULT_HEARTBEAT`]; nothing is sent to the server.
    #[default]
    Default,
    /// Watchdog off.
    Disabled,
    /// Ask the server for a heartbeat every interval and watch for it.
    Interval(Duration),
}

impl Heartbeat {
    /// Builds a heartbeat setting from milliseconds, `0` disabling it.
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            Heartbeat::Disabled
        } else {
            Heartbeat::Interval(Duration::from_millis(ms))
        }
    }

    /// Returns the interval the watchdog uses, if enabled.
    ///
    /// Explicit intervals are rounded up to whole milliseconds, the unit
    /// the server is sent.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Heartbeat::Default => Some(DEFAULT_HEARTBEAT),
            Heartbeat::Disabled => None,
            Heartbeat::Interval(d) if d.is_zero() => None,
            Heartbeat::Interval(d) => Some(ceil_millis(*d)),
        }
    }

    /// Returns the stall deadline: interval plus max(10%, 1s).
    pub fn timeout(&self) -> Option<Duration> {
        self.interval()
            .map(|interval| interval + (interval / 10).max(MIN_HEARTBEAT_GRACE))
    }
}

fn ceil_millis(d: Duration) -> Duration {
    let ms = d.as_nanos().div_ceil(1_000_000);
    Duration::from_millis(u64::try_from(ms).unwrap_or(u64::MAX))
}

/// Which revisions the server reports per change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Only the winning revision.
    MainOnly,
    /// All leaf revisions.
    AllDocs,
}

impl Style {
    /// Returns the `style` query value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Style::MainOnly => "main_only",
            Style::AllDocs => "all_docs",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options recognized by the changes feed.
///
/// Captured by value when a feed is constructed and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct FeedOptions {
    /// Framing and interaction pattern.
    pub feed: FeedMode,
    /// Starting position; superseded once any position is observed.
    pub since: Option<Seq>,
    /// Server-side filter name.
    pub filter: Option<String>,
    /// Restrict to these document IDs (sent as POST body).
    pub doc_ids: Vec<String>,
    /// Mango selector (sent as POST body, lower priority than `doc_ids`).
    pub selector: Option<serde_json::Value>,
    /// Include conflicting revisions in docs.
    pub conflicts: Option<bool>,
    /// Reverse feed order.
    pub descending: Option<bool>,
    /// Include document bodies.
    pub include_docs: Option<bool>,
    /// Include attachment bodies.
    pub attachments: Option<bool>,
    /// Include attachment encoding info.
    pub att_encoding_info: Option<bool>,
    /// Maximum number of records yielded.
    pub limit: Option<u64>,
    /// Revision style.
    pub style: Option<Style>,
    /// Server-side wait in milliseconds.
    pub timeout: Option<u64>,
    /// Sequence computation interval.
    pub seq_interval: Option<u64>,
    /// Heartbeat behavior (streaming modes only).
    pub heartbeat: Heartbeat,
    /// Reconnect on failure.
    pub live: bool,
    /// Extra query parameters, in insertion order.
    pub params: Vec<(String, String)>,
    /// Reconnection backoff.
    pub retry: RetryConfig,
}

impl FeedOptions {
    /// Creates default options (a one-shot `normal` feed).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the feed mode.
    pub fn with_feed(mut self, feed: FeedMode) -> Self {
        self.feed = feed;
        self
    }

    /// Sets the starting position.
    pub fn with_since(mut self, since: impl Into<Seq>) -> Self {
        self.since = Some(since.into());
        self
    }

    /// Sets the server-side filter.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Restricts the feed to the given document IDs.
    pub fn with_doc_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.doc_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a Mango selector.
    pub fn with_selector(mut self, selector: serde_json::Value) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Sets `conflicts`.
    pub fn with_conflicts(mut self, value: bool) -> Self {
        self.conflicts = Some(value);
        self
    }

    /// Sets `descending`.
    pub fn with_descending(mut self, value: bool) -> Self {
        self.descending = Some(value);
        self
    }

    /// Sets `include_docs`.
    pub fn with_include_docs(mut self, value: bool) -> Self {
        self.include_docs = Some(value);
        self
    }

    /// Sets `attachments`.
    pub fn with_attachments(mut self, value: bool) -> Self {
        self.attachments = Some(value);
        self
    }

    /// Sets `att_encoding_info`.
    pub fn with_att_encoding_info(mut self, value: bool) -> Self {
        self.att_encoding_info = Some(value);
        self
    }

    /// Caps the number of records yielded.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the revision style.
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    /// Sets the server-side wait.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout.as_millis() as u64);
        self
    }

    /// Sets `seq_interval`.
    pub fn with_seq_interval(mut self, interval: u64) -> Self {
        self.seq_interval = Some(interval);
        self
    }

    /// Sets heartbeat behavior.
    pub fn with_heartbeat(mut self, heartbeat: Heartbeat) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Enables or disables reconnection.
    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Appends an extra query parameter (e.g. filter arguments).
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Sets the reconnection backoff.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the stall deadline for this feed, if a watchdog applies.
    pub fn heartbeat_timeout(&self) -> Option<Duration> {
        if self.feed.is_batch() {
            return None;
        }
        self.heartbeat.timeout()
    }
}

/// Configuration for reconnection backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay unit doubled per attempt.
    pub initial_delay: Duration,
    /// Cap applied before jitter.
    pub max_delay: Duration,
    /// Upper bound of the uniform jitter.
    pub max_jitter: Duration,
}

impl RetryConfig {
    /// Creates the default configuration: 100ms units, 30s cap, 100ms jitter.
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(100),
        }
    }

    /// Sets the delay unit.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the jitter bound. Zero disables jitter.
    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Returns the capped delay for an attempt, before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Returns `min(2^attempt * initial, max) + uniform(0, jitter)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let bound = self.max_jitter.as_millis() as u64;
        if bound == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=bound))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}
