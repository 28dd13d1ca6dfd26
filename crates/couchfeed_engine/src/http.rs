//! reqwest-backed HTTP transport.

use crate::error::{FeedError, FeedResult};
use crate::transport::{FeedRequest, FeedResponse, HttpClient, Method};
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// Streaming HTTP client built on `reqwest`.
///
/// No overall request timeout is set: streaming feeds stay open
/// indefinitely and stalls are detected by the heartbeat watchdog.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a preconfigured `reqwest::Client` (proxies, TLS roots, ...).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(
        &self,
        request: FeedRequest,
        cancel: CancellationToken,
    ) -> FeedResult<FeedResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(FeedError::transport("request aborted")),
            response = builder.send() => response.map_err(|e| FeedError::transport(e.to_string()))?,
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| e.to_string()))
            .take_until(cancel.cancelled_owned())
            .boxed();

        Ok(FeedResponse {
            status,
            headers,
            body: Some(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FeedOptions, Heartbeat};
    use crate::feed::ChangesFeed;
    use crate::state::FeedState;
    use couchfeed_protocol::FeedMode;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio::time::{timeout, Instant};
    use url::Url;

    const LINE: &str = "{\"seq\":1,\"id\":\"a\",\"changes\":[{\"rev\":\"1-a\"}]}\n";

    fn client() -> Arc<ReqwestClient> {
        let inner = reqwest::Client::builder().no_proxy().build().unwrap();
        Arc::new(ReqwestClient::with_client(inner))
    }

    async fn read_head(socket: &mut TcpStream) -> String {
        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&head).into_owned()
    }

    /// Serves one connection. With `lines`, answers 200 with each line as a
    /// chunk; without, never answers. Either way the socket then stays open
    /// until the client goes away.
    async fn serve(lines: Option<Vec<&'static str>>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (head_tx, head_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let _ = head_tx.send(read_head(&mut socket).await);
            if let Some(lines) = lines {
                socket
                    .write_all(
                        b"HTTP/1.1 200 OK\r\n\
                          content-type: application/json\r\n\
                          transfer-encoding: chunked\r\n\r\n",
                    )
                    .await
                    .unwrap();
                for line in lines {
                    let chunk = format!("{:x}\r\n{line}\r\n", line.len());
                    socket.write_all(chunk.as_bytes()).await.unwrap();
                }
                socket.flush().await.unwrap();
            }
            let mut buf = [0u8; 64];
            while matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {}
        });

        (format!("http://{addr}/db"), head_rx)
    }

    fn continuous(heartbeat: Heartbeat) -> FeedOptions {
        FeedOptions::new()
            .with_feed(FeedMode::Continuous)
            .with_heartbeat(heartbeat)
    }

    #[tokio::test]
    async fn streams_chunked_body_until_cancelled() {
        let (base, head) = serve(Some(vec![LINE])).await;
        let request = FeedRequest {
            method: Method::Get,
            url: Url::parse(&format!("{base}/_changes?feed=continuous")).unwrap(),
            headers: vec![("Accept".into(), "application/json".into())],
            body: None,
        };
        let cancel = CancellationToken::new();

        let response = client().send(request, cancel.clone()).await.unwrap();
        assert_eq!(response.status, 200);
        assert!(response
            .headers
            .iter()
            .any(|(k, v)| k == "content-type" && v == "application/json"));

        let mut body = response.body.unwrap();
        let mut received = Vec::new();
        while !received.ends_with(b"\n") {
            let chunk = timeout(Duration::from_secs(5), body.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            received.extend_from_slice(&chunk);
        }
        assert_eq!(received, LINE.as_bytes());

        let head = head.await.unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get /db/_changes?feed=continuous http/1.1"));
        assert!(head.contains("accept: application/json"));

        cancel.cancel();
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn stop_ends_pull_on_open_stream() {
        let (base, _head) = serve(Some(vec![LINE])).await;
        let mut feed =
            ChangesFeed::with_client(&base, continuous(Heartbeat::Disabled), client()).unwrap();

        let first = feed.next().await.unwrap().unwrap();
        assert_eq!(first.id, "a");

        let handle = feed.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.stop();
        });

        let start = Instant::now();
        let pulled = timeout(Duration::from_secs(5), feed.next()).await.unwrap();
        assert!(pulled.is_none());
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(feed.state(), FeedState::Stopped);
    }

    #[tokio::test]
    async fn stop_aborts_unanswered_request() {
        let (base, _head) = serve(None).await;
        let mut feed =
            ChangesFeed::with_client(&base, continuous(Heartbeat::Disabled), client()).unwrap();

        let handle = feed.stop_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.stop();
        });

        let pulled = timeout(Duration::from_secs(5), feed.next()).await.unwrap();
        assert!(pulled.is_none());
        assert_eq!(feed.stats().requests, 1);
    }

    #[tokio::test]
    async fn watchdog_aborts_silent_stream() {
        let (base, _head) = serve(Some(vec![LINE])).await;
        // 100ms interval: 1s floor grace, 1.1s deadline
        let mut feed = ChangesFeed::with_client(
            &base,
            continuous(Heartbeat::from_millis(100)),
            client(),
        )
        .unwrap();

        assert_eq!(feed.next().await.unwrap().unwrap().id, "a");

        let err = timeout(Duration::from_secs(5), feed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert_eq!(
            err,
            FeedError::HeartbeatTimeout {
                timeout: Duration::from_millis(1_100)
            }
        );
        assert_eq!(feed.stats().heartbeat_timeouts, 1);
        assert!(feed.next().await.is_none());
    }
}
