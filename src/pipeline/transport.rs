//! The HTTP seam between the transcription client and the outside world.
//!
//! [`TranscriptionTransport`] performs exactly one POST and reports what came
//! back: a status code and a body, or a transport-level failure. It knows
//! nothing about retries or response shapes; those live in
//! [`crate::pipeline::transcribe`]. Tests substitute a scripted transport.

use crate::error::{Pdf2TextError, TransportError};
use crate::pipeline::transcribe::TranscriptionRequest;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Raw outcome of one request that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One outbound request per call, no retries.
#[async_trait]
pub trait TranscriptionTransport: Send + Sync {
    async fn send(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TransportResponse, TransportError>;
}

/// Bearer-authenticated JSON POST via `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport; `timeout` bounds each individual attempt.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, Pdf2TextError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edgequake-pdf2text/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Pdf2TextError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            timeout,
        })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl TranscriptionTransport for HttpTransport {
    async fn send(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TransportResponse, TransportError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        debug!("POST {} → {} ({} bytes)", self.endpoint, status, body.len());

        Ok(TransportResponse { status, body })
    }
}

impl HttpTransport {
    fn classify(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        let ok = |status| TransportResponse {
            status,
            body: String::new(),
        };
        assert!(ok(200).is_success());
        assert!(ok(204).is_success());
        assert!(!ok(199).is_success());
        assert!(!ok(301).is_success());
        assert!(!ok(429).is_success());
    }

    #[test]
    fn debug_redacts_key() {
        let t = HttpTransport::new(
            "http://localhost/v1/responses",
            "sk-secret",
            Duration::from_secs(5),
        )
        .expect("client builds");
        let dbg = format!("{t:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("redacted"));
    }
}
