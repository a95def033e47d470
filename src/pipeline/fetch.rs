//! HTTP capability: `GET url → (status, bytes)`.
//!
//! The chapter hosts block non-browser clients, so the real implementation
//! sends a browser-like `User-Agent` on every request. Status handling is
//! left to the caller: a non-2xx listing page is stage-fatal, a non-2xx page
//! image only skips that image.

use crate::config::SessionConfig;
use crate::error::{FetchError, MangaTmxError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;
use tracing::debug;

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single GET. Implementations must not retry.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError>;
}

/// [`HttpFetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl ReqwestFetcher {
    /// Build a client with the configured user agent and request timeout.
    pub fn new(config: &SessionConfig) -> Result<Self, MangaTmxError> {
        let mut headers = HeaderMap::new();
        let ua = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| MangaTmxError::InvalidConfig(format!("user agent: {e}")))?;
        headers.insert(USER_AGENT, ua);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MangaTmxError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn map_err(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| self.map_err(e))?;
        debug!("GET {} → {} ({} bytes)", url, status, body.len());

        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}
