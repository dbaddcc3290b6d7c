//! ABOUTME: HTTP client for the NGINX-RTMP status page
//! ABOUTME: One GET per scrape with a total request timeout

use async_trait::async_trait;
use bytes::Bytes;
use nr_core::{Error, Result};
use reqwest::Client;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Something that can produce the raw status document.
#[async_trait]
pub trait StatusSource: Send + Sync + fmt::Debug {
    /// Fetch the full document body. Errors are transient and never fatal.
    async fn fetch(&self) -> Result<Bytes>;
}

/// Fetches the status page over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: Client,
    uri: String,
    timeout: Duration,
}

impl HttpStatusSource {
    /// Create a source for `uri`; `timeout` bounds the whole request
    /// including the body.
    pub fn new(uri: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nginx_rtmp_exporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            uri: uri.into(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(format!("no response from {} within {:?}", self.uri, self.timeout))
        } else {
            Error::Fetch(format!("request to {} failed: {}", self.uri, err))
        }
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self) -> Result<Bytes> {
        let response = self
            .client
            .get(&self.uri)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        debug!(uri = %self.uri, bytes = body.len(), "Fetched status page");
        Ok(body)
    }
}
