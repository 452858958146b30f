// Transport - HTTP layer beneath the auth channel
//
// The engine never talks to reqwest directly; it goes through this
// trait so the state machine can be driven against a scripted server
// in tests and embedded behind other HTTP stacks.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::TransportError;

/// Default per-request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// One request/response round-trip. Implementations return the raw
/// response body for 2xx statuses and a `TransportError` otherwise.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, TransportError>;

    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).get(url, headers).await
    }

    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        (**self).post(url, headers, body).await
    }
}

/// reqwest-backed transport with a caller-configurable timeout
pub struct ReqwestTransport {
    client: Client,
    timeout_ms: u64,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(ReqwestTransport {
            client,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout_ms)
        } else {
            TransportError::Network(e.to_string())
        }
    }

    async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, TransportError> {
        let mut builder = builder;
        for (key, value) in headers {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        Ok(body.to_vec())
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .expect("default HTTP client construction cannot fail")
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, TransportError> {
        tracing::trace!("GET {}", url);
        self.execute(self.client.get(url), headers).await
    }

    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        tracing::trace!("POST {} ({} bytes)", url, body.len());
        self.execute(self.client.post(url).body(body), headers).await
    }
}
