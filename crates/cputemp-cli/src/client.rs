//! HTTP client for the temperature daemon.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Body of the temperature endpoint and of every JSON error.
#[derive(Debug, Deserialize)]
struct TempBody {
    temp: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PingBody {
    status: String,
}

/// Client for one daemon instance.
pub struct TempClient {
    http: reqwest::Client,
    base_url: String,
}

impl TempClient {
    /// Creates a client for the daemon at `base_url` (e.g. `http://localhost:64567/temp`).
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Returns the URL of an endpoint below the base.
    pub fn endpoint(&self, suffix: &str) -> String {
        format!("{}{}", self.base_url, suffix)
    }

    /// Gets the current temperature in Celsius.
    pub async fn temperature(&self) -> Result<f64> {
        let body: TempBody = self
            .get(&self.endpoint("/"))
            .await?
            .json()
            .await
            .context("Unexpected temperature response")?;
        body.temp.context("Daemon returned no temperature")
    }

    /// Gets the liveness status.
    pub async fn ping(&self) -> Result<String> {
        let body: PingBody = self
            .get(&self.endpoint("/ping"))
            .await?
            .json()
            .await
            .context("Unexpected ping response")?;
        Ok(body.status)
    }

    /// Gets the Prometheus exposition text.
    pub async fn metrics(&self) -> Result<String> {
        self.get(&self.endpoint("/metrics"))
            .await?
            .text()
            .await
            .context("Failed to read metrics response")
    }

    /// Sends a GET and fails on a non-success status, using the JSON `error`
    /// field when the daemon sent one.
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        debug!(url, "GET");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "Response");
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.context("Failed to read response")?;
        match error_message(&body) {
            Some(message) => bail!("{} ({})", message, status),
            None => bail!("Request failed with {}", status),
        }
    }
}

/// Extracts the `error` field of a JSON error body.
pub fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<TempBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers a single HTTP request with a canned JSON response and returns
    /// the base URL to reach it.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request).await.unwrap();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json; charset=utf-8\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}/temp", addr)
    }

    #[test]
    fn test_endpoint() {
        let client = TempClient::new("http://localhost:64567/temp/");
        assert_eq!(client.endpoint("/"), "http://localhost:64567/temp/");
        assert_eq!(client.endpoint("/ping"), "http://localhost:64567/temp/ping");
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(br#"{"temp":null,"error":"sensor gone"}"#),
            Some("sensor gone".to_string())
        );
        assert_eq!(error_message(br#"{"temp":null}"#), None);
        assert_eq!(error_message(b"not json"), None);
    }

    #[test]
    fn test_temp_body() {
        let body: TempBody = serde_json::from_str(r#"{"temp":38.5}"#).unwrap();
        assert_eq!(body.temp, Some(38.5));
        assert!(body.error.is_none());
    }

    #[tokio::test]
    async fn test_temperature_request() {
        let url = serve_once("200 OK", r#"{"temp":41.25}"#).await;
        let client = TempClient::new(&url);
        assert_eq!(client.temperature().await.unwrap(), 41.25);
    }

    #[tokio::test]
    async fn test_ping_request() {
        let url = serve_once("200 OK", r#"{"status":"UP"}"#).await;
        let client = TempClient::new(&url);
        assert_eq!(client.ping().await.unwrap(), "UP");
    }

    #[tokio::test]
    async fn test_error_response() {
        let url = serve_once(
            "500 Internal Server Error",
            r#"{"temp":null,"error":"sensor gone"}"#,
        )
        .await;
        let client = TempClient::new(&url);
        let error = client.temperature().await.unwrap_err().to_string();
        assert!(error.contains("sensor gone"), "{}", error);
    }
}
