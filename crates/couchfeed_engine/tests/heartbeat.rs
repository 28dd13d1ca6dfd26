//! Integration tests for the heartbeat watchdog.

mod common;

use common::*;
use couchfeed_engine::{FeedError, FeedMode, FeedOptions, FeedState, Heartbeat, MockReply};
use couchfeed_testkit::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

/// 5s interval: 10% is below the floor, so the deadline is 6s.
fn watched(mode: FeedMode) -> FeedOptions {
    FeedOptions::new()
        .with_feed(mode)
        .with_heartbeat(Heartbeat::from_millis(5_000))
}

#[tokio::test(start_paused = true)]
async fn silence_raises_timeout() {
    let (mut feed, client) = feed_with(
        watched(FeedMode::Continuous),
        vec![MockReply::ok([encode_continuous(&sample_records(1))]).stalled()],
    );

    take(&mut feed, 1).await;
    let start = Instant::now();
    let err = feed.next().await.unwrap().unwrap_err();

    assert_eq!(
        err,
        FeedError::HeartbeatTimeout {
            timeout: Duration::from_secs(6)
        }
    );
    assert!(start.elapsed() >= Duration::from_secs(6));
    assert!(start.elapsed() < Duration::from_millis(6_100));
    assert_eq!(feed.state(), FeedState::Stopped);
    assert_eq!(feed.stats().heartbeat_timeouts, 1);
    assert!(feed.next().await.is_none());
    assert_eq!(client.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn any_byte_resets_deadline() {
    let line = |seq: u64| encode_continuous(&[record(seq, &format!("doc-{seq}"))]);
    let (mut feed, _client) = feed_with(
        watched(FeedMode::Continuous),
        vec![MockReply::timed([
            (Duration::ZERO, line(1)),
            (Duration::from_secs(5), b"\n".to_vec()),
            (Duration::from_secs(5), b"\n".to_vec()),
            (Duration::from_secs(5), line(2)),
        ])],
    );
    let start = Instant::now();

    let yielded: Vec<_> = drain(&mut feed).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(seqs(&yielded), numeric_seqs(1..=2));
    assert!(start.elapsed() >= Duration::from_secs(15));
    assert_eq!(feed.stats().heartbeat_timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn partial_line_counts_as_activity() {
    let body = encode_continuous(&sample_records(1));
    let (head, tail) = body.split_at(10);
    let (mut feed, _client) = feed_with(
        watched(FeedMode::Continuous),
        vec![MockReply::timed([
            (Duration::from_secs(4), head.to_vec()),
            (Duration::from_secs(4), tail.to_vec()),
        ])],
    );

    let yielded = take(&mut feed, 1).await;
    assert_eq!(yielded[0].id, "doc-1");
}

#[tokio::test(start_paused = true)]
async fn eventsource_comments_keep_connection_alive() {
    let mut late = b": keepalive\n".to_vec();
    late.extend_from_slice(&encode_eventsource(&sample_records(1)));
    let (mut feed, _client) = feed_with(
        watched(FeedMode::EventSource),
        vec![MockReply::timed([
            (Duration::from_secs(5), b"\n".to_vec()),
            (Duration::from_secs(5), late),
        ])],
    );

    let yielded = take(&mut feed, 1).await;
    assert_eq!(yielded[0].id, "doc-1");
}

#[tokio::test(start_paused = true)]
async fn default_heartbeat_is_sixty_six_seconds() {
    let (mut feed, client) = feed_with(
        FeedOptions::new().with_feed(FeedMode::Continuous),
        vec![MockReply::ok(Vec::<Vec<u8>>::new()).stalled()],
    );
    let start = Instant::now();

    let err = feed.next().await.unwrap().unwrap_err();

    assert!(matches!(err, FeedError::HeartbeatTimeout { .. }));
    assert!(start.elapsed() >= Duration::from_secs(66));
    assert_eq!(client.requests()[0].query("heartbeat"), None);
}

#[tokio::test(start_paused = true)]
async fn disabled_heartbeat_waits_forever() {
    let (mut feed, _client) = feed_with(
        FeedOptions::new()
            .with_feed(FeedMode::Continuous)
            .with_heartbeat(Heartbeat::Disabled),
        vec![MockReply::ok(Vec::<Vec<u8>>::new()).stalled()],
    );

    let pulled = tokio::time::timeout(Duration::from_secs(3_600), feed.next()).await;
    assert!(pulled.is_err());
    assert_eq!(feed.stats().heartbeat_timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn batch_modes_have_no_watchdog() {
    let (mut feed, _client) = feed_with(
        FeedOptions::new()
            .with_feed(FeedMode::Longpoll)
            .with_heartbeat(Heartbeat::from_millis(1_000)),
        vec![MockReply::timed([(
            Duration::from_secs(120),
            encode_batch(&sample_records(1), 1u64),
        )])],
    );

    let yielded = take(&mut feed, 1).await;
    assert_eq!(yielded[0].id, "doc-1");
    assert_eq!(feed.stats().heartbeat_timeouts, 0);
    feed.stop();
}

#[tokio::test(start_paused = true)]
async fn live_timeout_reconnects_from_cursor() {
    let (mut feed, client) = feed_with(
        watched(FeedMode::Continuous)
            .with_live(true)
            .with_retry(exact_retry()),
        vec![
            MockReply::ok([encode_continuous(&sample_records(1))]).stalled(),
            MockReply::ok([encode_continuous(&[record(2, "doc-2")])]).stalled(),
        ],
    );

    take(&mut feed, 1).await;
    let start = Instant::now();
    let second = take(&mut feed, 1).await;

    assert_eq!(second[0].id, "doc-2");
    // 6s watchdog plus the first 200ms backoff
    assert!(start.elapsed() >= Duration::from_millis(6_200));
    assert_eq!(feed.stats().heartbeat_timeouts, 1);
    let requests = client.requests();
    assert_eq!(requests[1].query("since").as_deref(), Some("1"));
    assert_eq!(requests[1].query("heartbeat").as_deref(), Some("5000"));
    feed.stop();
}
