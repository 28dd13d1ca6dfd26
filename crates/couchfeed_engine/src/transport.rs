//! Transport layer abstraction for feed requests.

use crate::error::{FeedError, FeedResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A response body as a stream of raw chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, String>>;

/// HTTP method of a feed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET (no body).
    Get,
    /// POST (JSON body).
    Post,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully built `_changes` request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRequest {
    /// Method.
    pub method: Method,
    /// Target URL (credentials removed).
    pub url: Url,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

impl FeedRequest {
    /// Returns the first header value with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the first query parameter value with the given name.
    pub fn query(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// A response whose body has not been read yet.
pub struct FeedResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Body stream, if the transport exposes one.
    pub body: Option<ByteStream>,
}

impl FeedResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for FeedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to plug in the actual HTTP stack. Implementations
/// should abort the call when `cancel` fires; the feed additionally drops
/// the pending future, so a client that ignores the token is still torn down.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns once response headers are available.
    async fn send(&self, request: FeedRequest, cancel: CancellationToken)
        -> FeedResult<FeedResponse>;
}

/// One body chunk delivered by [`MockClient`].
#[derive(Debug, Clone)]
pub struct MockChunk {
    /// Delay before the chunk is delivered.
    pub delay: Duration,
    /// Chunk bytes, or a mid-body transport failure.
    pub data: Result<Bytes, String>,
}

/// A scripted reply for [`MockClient`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Respond with a status and a chunked body.
    Respond {
        /// Status code.
        status: u16,
        /// Body chunks, in order.
        chunks: Vec<MockChunk>,
        /// Whether the response has a body stream at all.
        has_body: bool,
        /// Keep the body open forever after the last chunk.
        stall: bool,
    },
    /// Fail before any response.
    Fail(String),
}

impl MockReply {
    /// 200 response with the given chunks.
    pub fn ok<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self::Respond {
            status: 200,
            chunks: chunks
                .into_iter()
                .map(|c| MockChunk {
                    delay: Duration::ZERO,
                    data: Ok(c.into()),
                })
                .collect(),
            has_body: true,
            stall: false,
        }
    }

    /// 200 response whose chunks arrive after the given delays.
    pub fn timed<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = (Duration, B)>,
        B: Into<Bytes>,
    {
        Self::Respond {
            status: 200,
            chunks: chunks
                .into_iter()
                .map(|(delay, c)| MockChunk {
                    delay,
                    data: Ok(c.into()),
                })
                .collect(),
            has_body: true,
            stall: false,
        }
    }

    /// Response with an arbitrary status and a single-chunk body.
    pub fn status(status: u16, body: impl Into<Bytes>) -> Self {
        Self::Respond {
            status,
            chunks: vec![MockChunk {
                delay: Duration::ZERO,
                data: Ok(body.into()),
            }],
            has_body: true,
            stall: false,
        }
    }

    /// 200 response without a body stream.
    pub fn without_body() -> Self {
        Self::Respond {
            status: 200,
            chunks: Vec::new(),
            has_body: false,
            stall: false,
        }
    }

    /// Transport failure before any response.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    /// Keeps the body open after the scripted chunks.
    pub fn stalled(mut self) -> Self {
        if let Self::Respond { stall, .. } = &mut self {
            *stall = true;
        }
        self
    }

    /// Appends a mid-body transport failure.
    pub fn then_error(mut self, message: impl Into<String>) -> Self {
        if let Self::Respond { chunks, .. } = &mut self {
            chunks.push(MockChunk {
                delay: Duration::ZERO,
                data: Err(message.into()),
            });
        }
        self
    }
}

/// A scripted HTTP client for testing.
///
/// Replies are consumed in order, one per request. Once the script is
/// exhausted, requests hang until cancelled, like a server with nothing
/// new to report.
#[derive(Debug, Default)]
pub struct MockClient {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<FeedRequest>>,
}

impl MockClient {
    /// Creates a client with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client with the given script.
    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let client = Self::new();
        client.replies.lock().extend(replies);
        client
    }

    /// Appends a reply to the script.
    pub fn push_reply(&self, reply: MockReply) {
        self.replies.lock().push_back(reply);
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<FeedRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of unused replies.
    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn send(
        &self,
        request: FeedRequest,
        cancel: CancellationToken,
    ) -> FeedResult<FeedResponse> {
        self.requests.lock().push(request);
        let reply = self.replies.lock().pop_front();

        match reply {
            None => {
                cancel.cancelled().await;
                Err(FeedError::transport("request aborted"))
            }
            Some(MockReply::Fail(message)) => Err(FeedError::transport(message)),
            Some(MockReply::Respond {
                status,
                chunks,
                has_body,
                stall,
            }) => {
                let body = has_body.then(|| mock_body(chunks, stall));
                Ok(FeedResponse {
                    status,
                    headers: vec![("content-type".into(), "application/json".into())],
                    body,
                })
            }
        }
    }
}

fn mock_body(chunks: Vec<MockChunk>, stall: bool) -> ByteStream {
    let scripted = stream::iter(chunks).then(|chunk| async move {
        if !chunk.delay.is_zero() {
            tokio::time::sleep(chunk.delay).await;
        }
        chunk.data
    });

    if stall {
        scripted.chain(stream::pending()).boxed()
    } else {
        scripted.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> FeedRequest {
        FeedRequest {
            method: Method::Get,
            url: Url::parse("http://localhost:5984/db/_changes?feed=normal").unwrap(),
            headers: vec![("Accept".into(), "application/json".into())],
            body: None,
        }
    }

    #[tokio::test]
    async fn mock_replays_script_in_order() {
        let client = MockClient::with_replies([
            MockReply::fail("connection refused"),
            MockReply::ok(["a", "b"]),
        ]);

        let err = client
            .send(request(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, FeedError::transport("connection refused"));

        let response = client
            .send(request(), CancellationToken::new())
            .await
            .unwrap();
        assert!(response.is_success());
        let chunks: Vec<Result<Bytes, String>> = response.body.unwrap().collect().await;
        let expected: Vec<Result<Bytes, String>> = vec![Ok(Bytes::from("a")), Ok(Bytes::from("b"))];
        assert_eq!(chunks, expected);

        assert_eq!(client.request_count(), 2);
        assert_eq!(client.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_script_waits_for_cancel() {
        let client = MockClient::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.send(request(), cancel).await;
        assert!(result.is_err());
    }

    #[test]
    fn request_accessors() {
        let request = request();
        assert_eq!(request.header("accept"), Some("application/json"));
        assert_eq!(request.query("feed").as_deref(), Some("normal"));
        assert_eq!(request.query("since"), None);
    }

    #[test]
    fn status_reply() {
        match MockReply::status(503, "busy") {
            MockReply::Respond { status, chunks, .. } => {
                assert_eq!(status, 503);
                assert_eq!(chunks.len(), 1);
            }
            MockReply::Fail(_) => panic!("expected a response"),
        }
    }
}
