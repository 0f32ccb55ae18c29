use anyhow::{Result, anyhow};
use std::time::{Duration, Instant};

/// What an outbound check observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub latency_ms: u64,
}

/// Transport used by probes. An `Err` means no HTTP response was obtained.
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, target: &str) -> Result<ProbeResponse>;
}

/// HTTP/HTTPS checker
///
/// Issues a single GET with a hard timeout. Redirects are not followed: the
/// status of the first response is what gets classified.
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, target: &str) -> Result<ProbeResponse> {
        let start = Instant::now();

        let response = self
            .client
            .get(target)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let latency_ms = start.elapsed().as_millis() as u64;

        Ok(ProbeResponse { status_code: response.status().as_u16(), latency_ms })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `status_line` to every connection on a loopback port, returning the base URL.
    pub(crate) async fn spawn_http_stub(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\nLocation: http://{addr}/elsewhere\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}/")
    }

    /// A loopback URL nothing listens on
    pub(crate) async fn refused_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}/")
    }

    #[tokio::test]
    async fn test_reports_status_code() {
        let checker = HttpChecker::new(Duration::from_secs(5)).unwrap();
        let url = spawn_http_stub("200 OK").await;

        let response = checker.check(&url).await.unwrap();
        assert_eq!(response.status_code, 200);
    }

    #[tokio::test]
    async fn test_does_not_follow_redirects() {
        let checker = HttpChecker::new(Duration::from_secs(5)).unwrap();
        let url = spawn_http_stub("301 Moved Permanently").await;

        let response = checker.check(&url).await.unwrap();
        assert_eq!(response.status_code, 301);
    }

    #[tokio::test]
    async fn test_connection_refused_is_an_error() {
        let checker = HttpChecker::new(Duration::from_secs(5)).unwrap();
        assert!(checker.check(&refused_url().await).await.is_err());
    }
}
