//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use couchfeed_engine::{
    ChangeRecord, ChangesFeed, FeedOptions, FeedResult, MockClient, MockReply, RetryConfig, Seq,
};
use std::sync::Arc;
use std::time::Duration;

pub const DB_URL: &str = "http://localhost:5984/db";

/// Builds a feed over a scripted client.
pub fn feed_with(options: FeedOptions, replies: Vec<MockReply>) -> (ChangesFeed, Arc<MockClient>) {
    let client = Arc::new(MockClient::with_replies(replies));
    let feed = ChangesFeed::with_client(DB_URL, options, client.clone()).unwrap();
    (feed, client)
}

/// Backoff without jitter, so paused-time tests can assert exact delays.
pub fn exact_retry() -> RetryConfig {
    RetryConfig::new().with_max_jitter(Duration::ZERO)
}

/// Pulls until the feed ends.
pub async fn drain(feed: &mut ChangesFeed) -> Vec<FeedResult<ChangeRecord>> {
    let mut items = Vec::new();
    while let Some(item) = feed.next().await {
        items.push(item);
    }
    items
}

/// Pulls exactly `n` records, panicking on errors or early end.
pub async fn take(feed: &mut ChangesFeed, n: usize) -> Vec<ChangeRecord> {
    let mut records = Vec::with_capacity(n);
    for _ in 0..n {
        records.push(feed.next().await.expect("feed ended early").expect("feed failed"));
    }
    records
}

pub fn seqs(records: &[ChangeRecord]) -> Vec<Seq> {
    records.iter().map(|r| r.seq.clone()).collect()
}

pub fn numeric_seqs(range: std::ops::RangeInclusive<u64>) -> Vec<Seq> {
    range.map(Seq::from).collect()
}
