//! Feed state machine.

use crate::error::{FeedError, FeedResult};
use crate::request::RequestBuilder;
use crate::retry::Backoff;
use crate::transport::{ByteStream, HttpClient};
use crate::watchdog::Watchdog;
use couchfeed_protocol::{ChangeRecord, ChangesBatch, FeedLine, FeedMode, LineDecoder, ProtocolResult, Seq};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

/// The current state of a changes feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Created, nothing requested yet.
    Idle,
    /// A request is being issued.
    Connecting,
    /// A response was accepted and is being consumed.
    Streaming,
    /// Waiting for the next bytes of a streaming response under the watchdog.
    AwaitingHeartbeat,
    /// Waiting out the backoff before reconnecting.
    Retrying,
    /// Terminal: no further requests, timers or records.
    Stopped,
}

impl FeedState {
    /// Returns true once the feed can no longer yield.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FeedState::Stopped)
    }

    /// Returns true while a connection is open or being opened.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            FeedState::Connecting | FeedState::Streaming | FeedState::AwaitingHeartbeat
        )
    }
}

/// Counters describing a feed's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Requests issued.
    pub requests: u64,
    /// Records yielded.
    pub records: u64,
    /// Reconnections scheduled after a failure.
    pub retries: u64,
    /// Connections aborted by the watchdog.
    pub heartbeat_timeouts: u64,
    /// Last failure, retried or not.
    pub last_error: Option<String>,
}

/// Outcome of one step of the state machine.
enum Step {
    Continue,
    Record(ChangeRecord),
    Failed(FeedError),
}

/// A response being consumed.
enum Connection {
    /// Parsed `normal`/`longpoll` results not yet yielded.
    Batch(VecDeque<ChangeRecord>),
    /// An open `continuous`/`eventsource` body.
    Lines(LineStream),
}

struct LineStream {
    body: ByteStream,
    decoder: LineDecoder,
    watchdog: Watchdog,
    ended: bool,
    /// Cancels the request token when the connection is dropped.
    _guard: DropGuard,
}

impl LineStream {
    fn buffered(&mut self) -> Option<ProtocolResult<FeedLine>> {
        if let Some(item) = self.decoder.next_item() {
            return Some(item);
        }
        if self.ended {
            return self.decoder.finish();
        }
        None
    }
}

/// Drives requests, framing, the watchdog and reconnection for one feed.
///
/// Only the pulling task mutates the cursor, the retry counter and the
/// state; stopping from elsewhere goes through the root token.
pub(crate) struct FeedEngine {
    builder: RequestBuilder,
    client: Arc<dyn HttpClient>,
    root: CancellationToken,
    state: FeedState,
    cursor: Option<Seq>,
    backoff: Backoff,
    retry_delay: Duration,
    connection: Option<Connection>,
    yielded: u64,
    stats: FeedStats,
}

impl FeedEngine {
    pub(crate) fn new(
        builder: RequestBuilder,
        client: Arc<dyn HttpClient>,
        root: CancellationToken,
    ) -> Self {
        let backoff = Backoff::new(builder.options().retry.clone());
        Self {
            builder,
            client,
            root,
            state: FeedState::Idle,
            cursor: None,
            backoff,
            retry_delay: Duration::ZERO,
            connection: None,
            yielded: 0,
            stats: FeedStats::default(),
        }
    }

    /// A cancelled root reads as `Stopped` even before the next pull
    /// observes it.
    pub(crate) fn state(&self) -> FeedState {
        if self.root.is_cancelled() {
            FeedState::Stopped
        } else {
            self.state
        }
    }

    pub(crate) fn cursor(&self) -> Option<&Seq> {
        self.cursor.as_ref()
    }

    pub(crate) fn retry_count(&self) -> u32 {
        self.backoff.retry_count()
    }

    pub(crate) fn stats(&self) -> &FeedStats {
        &self.stats
    }

    pub(crate) fn root(&self) -> &CancellationToken {
        &self.root
    }

    pub(crate) fn set_root(&mut self, root: CancellationToken) {
        self.root = root;
    }

    /// Pulls the next record.
    ///
    /// `None` means the feed is stopped; every later call returns `None` too.
    pub(crate) async fn next(&mut self) -> Option<FeedResult<ChangeRecord>> {
        loop {
            if self.state.is_terminal() {
                return None;
            }
            if self.root.is_cancelled() {
                self.finish("stopped");
                return None;
            }
            if self.limit_reached() {
                self.finish("limit reached");
                return None;
            }

            let step = match self.state {
                FeedState::Idle | FeedState::Connecting => self.connect().await,
                FeedState::Retrying => self.wait_retry().await,
                FeedState::Streaming | FeedState::AwaitingHeartbeat => self.advance().await,
                FeedState::Stopped => return None,
            };

            match step {
                Step::Continue => {}
                Step::Record(record) => return Some(Ok(self.deliver(record))),
                Step::Failed(err) => {
                    if let Some(err) = self.fail(err) {
                        return Some(Err(err));
                    }
                }
            }
        }
    }

    /// Stops the feed and releases the connection.
    pub(crate) fn finish(&mut self, reason: &str) {
        if !self.state.is_terminal() {
            info!(reason, records = self.yielded, cursor = ?self.cursor, "changes feed stopped");
        }
        self.state = FeedState::Stopped;
        self.connection = None;
        self.root.cancel();
    }

    fn limit_reached(&self) -> bool {
        self.builder
            .options()
            .limit
            .is_some_and(|limit| self.yielded >= limit)
    }

    async fn connect(&mut self) -> Step {
        self.state = FeedState::Connecting;
        let request = self.builder.build(self.cursor.as_ref());
        let token = self.root.child_token();
        let guard = token.clone().drop_guard();
        let mut watchdog = Watchdog::new(self.builder.options().heartbeat_timeout(), token.clone());

        self.stats.requests += 1;
        debug!(
            method = %request.method,
            url = %request.url,
            cursor = ?self.cursor,
            "opening changes request"
        );

        let sent = tokio::select! {
            biased;
            _ = self.root.cancelled() => return Step::Continue,
            result = self.client.send(request, token) => result,
            err = watchdog.expired() => Err(err),
        };
        let response = match sent {
            Ok(response) => response,
            Err(err) => return Step::Failed(err),
        };

        if !response.is_success() {
            let status = response.status;
            let text = match response.body {
                Some(body) => match read_body(&self.root, body, &mut watchdog).await {
                    None => return Step::Continue,
                    Some(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_string(),
                    Some(Err(_)) => String::new(),
                },
                None => String::new(),
            };
            debug!(status, "changes request rejected");
            return Step::Failed(FeedError::http_status(status, text));
        }

        let Some(body) = response.body else {
            return Step::Failed(FeedError::BodyUnavailable);
        };

        match self.builder.options().feed.line_format() {
            None => {
                let bytes = match read_body(&self.root, body, &mut watchdog).await {
                    None => return Step::Continue,
                    Some(Ok(bytes)) => bytes,
                    Some(Err(err)) => return Step::Failed(err),
                };
                let batch = match ChangesBatch::decode(&bytes) {
                    Ok(batch) => batch,
                    Err(err) => return Step::Failed(err.into()),
                };
                debug!(
                    records = batch.results.len(),
                    last_seq = ?batch.last_seq,
                    "received changes batch"
                );
                if let Some(seq) = batch.resume_seq() {
                    self.cursor = Some(seq);
                }
                self.connection = Some(Connection::Batch(batch.results.into()));
            }
            Some(format) => {
                debug!(?format, "changes stream open");
                self.connection = Some(Connection::Lines(LineStream {
                    body,
                    decoder: LineDecoder::new(format),
                    watchdog,
                    ended: false,
                    _guard: guard,
                }));
            }
        }

        self.state = FeedState::Streaming;
        Step::Continue
    }

    async fn wait_retry(&mut self) -> Step {
        let delay = self.retry_delay;
        let elapsed = tokio::select! {
            biased;
            _ = self.root.cancelled() => false,
            _ = sleep(delay) => true,
        };
        if elapsed {
            self.state = FeedState::Connecting;
        }
        Step::Continue
    }

    async fn advance(&mut self) -> Step {
        match self.connection.as_mut() {
            None => {
                self.state = FeedState::Connecting;
                Step::Continue
            }
            Some(Connection::Batch(records)) => match records.pop_front() {
                Some(record) => Step::Record(record),
                None => {
                    self.connection = None;
                    self.batch_exhausted();
                    Step::Continue
                }
            },
            Some(Connection::Lines(stream)) => {
                if let Some(item) = stream.buffered() {
                    return self.on_line(item);
                }
                if stream.ended {
                    self.connection = None;
                    self.stream_ended();
                    return Step::Continue;
                }
                self.read_chunk().await
            }
        }
    }

    async fn read_chunk(&mut self) -> Step {
        let Some(Connection::Lines(stream)) = self.connection.as_mut() else {
            return Step::Continue;
        };
        if stream.watchdog.is_enabled() {
            self.state = FeedState::AwaitingHeartbeat;
        }

        let chunk = tokio::select! {
            biased;
            _ = self.root.cancelled() => return Step::Continue,
            chunk = stream.body.next() => chunk,
            err = stream.watchdog.expired() => return Step::Failed(err),
        };
        self.state = FeedState::Streaming;

        match chunk {
            Some(Ok(chunk)) => {
                stream.watchdog.arm();
                stream.decoder.feed(&chunk);
                Step::Continue
            }
            Some(Err(message)) => Step::Failed(FeedError::transport(message)),
            None => {
                stream.ended = true;
                Step::Continue
            }
        }
    }

    fn on_line(&mut self, item: ProtocolResult<FeedLine>) -> Step {
        match item {
            Ok(FeedLine::Change(record)) => {
                self.cursor = Some(record.seq.clone());
                Step::Record(record)
            }
            Ok(FeedLine::LastSeq(seq)) => {
                debug!(%seq, "server ended the response");
                self.cursor = Some(seq);
                Step::Continue
            }
            Err(err) => Step::Failed(err.into()),
        }
    }

    fn batch_exhausted(&mut self) {
        match self.builder.options().feed {
            FeedMode::Longpoll => self.state = FeedState::Connecting,
            _ => self.finish("results exhausted"),
        }
    }

    fn stream_ended(&mut self) {
        if self.builder.options().live {
            debug!("changes stream ended, reconnecting");
            self.state = FeedState::Connecting;
        } else {
            self.finish("stream ended");
        }
    }

    fn deliver(&mut self, record: ChangeRecord) -> ChangeRecord {
        self.yielded += 1;
        self.stats.records += 1;
        self.backoff.reset();
        trace!(seq = %record.seq, id = %record.id, deleted = record.deleted, "change");
        record
    }

    /// Schedules a retry or ends the feed; returns the error to surface.
    fn fail(&mut self, err: FeedError) -> Option<FeedError> {
        self.connection = None;
        if self.root.is_cancelled() {
            self.finish("stopped");
            return None;
        }

        if matches!(err, FeedError::HeartbeatTimeout { .. }) {
            self.stats.heartbeat_timeouts += 1;
        }
        self.stats.last_error = Some(err.to_string());

        if self.builder.options().live && err.is_retryable() {
            let delay = self.backoff.next_delay();
            self.stats.retries += 1;
            warn!(
                error = %err,
                attempt = self.backoff.retry_count(),
                ?delay,
                "changes request failed, retrying"
            );
            self.retry_delay = delay;
            self.state = FeedState::Retrying;
            return None;
        }

        warn!(error = %err, "changes feed failed");
        self.finish("error");
        Some(err)
    }
}

/// Reads a whole body, giving up on stop or stall.
async fn read_body(
    root: &CancellationToken,
    mut body: ByteStream,
    watchdog: &mut Watchdog,
) -> Option<FeedResult<Vec<u8>>> {
    let mut bytes = Vec::new();
    loop {
        let chunk = tokio::select! {
            biased;
            _ = root.cancelled() => return None,
            chunk = body.next() => chunk,
            err = watchdog.expired() => return Some(Err(err)),
        };
        match chunk {
            Some(Ok(chunk)) => {
                watchdog.arm();
                bytes.extend_from_slice(&chunk);
            }
            Some(Err(message)) => return Some(Err(FeedError::transport(message))),
            None => return Some(Ok(bytes)),
        }
    }
}
