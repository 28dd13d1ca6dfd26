//! Public changes feed.

use crate::config::FeedOptions;
use crate::error::FeedResult;
use crate::request::RequestBuilder;
use crate::state::{FeedEngine, FeedState, FeedStats};
use crate::transport::HttpClient;
use couchfeed_protocol::{ChangeRecord, Seq};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A resumable, pull-based changes feed.
///
/// Records are read from the network only when [`next`](Self::next) is
/// awaited, so a slow consumer never causes unbounded buffering.
///
/// # Example
///
/// ```no_run
/// use couchfeed_engine::{ChangesFeed, FeedMode, FeedOptions};
///
/// # async fn run() -> Result<(), couchfeed_engine::FeedError> {
/// let options = FeedOptions::new()
///     .with_feed(FeedMode::Continuous)
///     .with_since("now")
///     .with_live(true);
/// let mut feed = ChangesFeed::new("http://localhost:5984/mydb", options)?;
///
/// while let Some(change) = feed.next().await {
///     let change = change?;
///     println!("{} {}", change.seq, change.id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ChangesFeed {
    engine: FeedEngine,
}

impl ChangesFeed {
    /// Creates a feed for the database at `db_url` using the reqwest transport.
    #[cfg(feature = "reqwest")]
    pub fn new(db_url: &str, options: FeedOptions) -> FeedResult<Self> {
        Self::with_client(db_url, options, Arc::new(crate::http::ReqwestClient::new()))
    }

    /// Creates a feed that sends its requests through `client`.
    pub fn with_client(
        db_url: &str,
        options: FeedOptions,
        client: Arc<dyn HttpClient>,
    ) -> FeedResult<Self> {
        let builder = RequestBuilder::new(db_url, options)?;
        Ok(Self {
            engine: FeedEngine::new(builder, client, CancellationToken::new()),
        })
    }

    /// Ties this feed to a parent token: cancelling `parent` stops the feed.
    ///
    /// Stop handles must be taken after this call.
    pub fn with_cancellation(mut self, parent: &CancellationToken) -> Self {
        self.engine.set_root(parent.child_token());
        self
    }

    /// Pulls the next record.
    ///
    /// Returns `None` once the feed is stopped, exhausted or has surfaced a
    /// terminal error.
    pub async fn next(&mut self) -> Option<FeedResult<ChangeRecord>> {
        self.engine.next().await
    }

    /// Stops the feed, cancelling any in-flight request. Idempotent.
    pub fn stop(&mut self) {
        self.engine.finish("stop requested");
    }

    /// Returns a handle that can stop this feed from another task.
    ///
    /// Stopping through the handle cancels the in-flight request at once and
    /// `state()` reports `Stopped` immediately. The connection itself is
    /// released by the pending or next `next()` call.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.engine.root().clone(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> FeedState {
        self.engine.state()
    }

    /// Returns the position the next request would resume from.
    pub fn last_seq(&self) -> Option<&Seq> {
        self.engine.cursor()
    }

    /// Returns the number of consecutive failed attempts.
    pub fn retry_count(&self) -> u32 {
        self.engine.retry_count()
    }

    /// Returns lifetime counters.
    pub fn stats(&self) -> FeedStats {
        self.engine.stats().clone()
    }

    /// Converts the feed into a `Stream`.
    pub fn into_stream(self) -> BoxStream<'static, FeedResult<ChangeRecord>> {
        stream::unfold(self, |mut feed| async move {
            let item = feed.next().await?;
            Some((item, feed))
        })
        .boxed()
    }
}

impl Drop for ChangesFeed {
    fn drop(&mut self) {
        self.engine.root().cancel();
    }
}

impl std::fmt::Debug for ChangesFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangesFeed")
            .field("state", &self.engine.state())
            .field("last_seq", &self.engine.cursor())
            .field("retry_count", &self.engine.retry_count())
            .finish()
    }
}

/// Stops a [`ChangesFeed`] from outside the pulling task.
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Stops the feed. The pending or next pull returns `None`.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Returns true once the feed has been stopped by any means.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}
