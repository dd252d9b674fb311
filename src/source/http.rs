//! HTTP item source.
//!
//! Performs one GET per cycle with cache-busting headers, enforces a timeout
//! and a body size limit, then hands the bytes to [`parse_payload`].

use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::Encoding;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA, USER_AGENT};

use super::payload::parse_payload;
use super::{ItemSource, RawItem};
use crate::config::FetcherConfig;
use crate::error::{ConfigError, FetchError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

const USER_AGENT_VALUE: &str = concat!("newsfeed-fetcher/", env!("CARGO_PKG_VERSION"));

/// Fetches the item list from an HTTP endpoint.
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
    encoding: &'static Encoding,
    log_feed_warnings: bool,
    timeout: Duration,
}

impl HttpSource {
    /// Create a source with its own client.
    ///
    /// Fails only if the configured encoding label is unknown.
    pub fn new(config: &FetcherConfig) -> Result<Self, ConfigError> {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a source sharing an existing client.
    pub fn with_client(config: &FetcherConfig, client: reqwest::Client) -> Result<Self, ConfigError> {
        Ok(Self {
            url: config.url.clone(),
            client,
            encoding: config.text_encoding()?,
            log_feed_warnings: config.log_feed_warnings,
            timeout: REQUEST_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_body(&self) -> Result<(Vec<u8>, Option<String>), FetchError> {
        let mut response = self
            .client
            .get(&self.url)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(CACHE_CONTROL, "max-age=0, no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        // Fast path: check Content-Length header
        if let Some(len) = response.content_length() {
            if len > MAX_BODY_SIZE as u64 {
                return Err(FetchError::ResponseTooLarge);
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len().saturating_add(chunk.len()) > MAX_BODY_SIZE {
                return Err(FetchError::ResponseTooLarge);
            }
            body.extend_from_slice(&chunk);
        }

        Ok((body, content_type))
    }
}

#[async_trait]
impl ItemSource for HttpSource {
    fn url(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<RawItem>, FetchError> {
        let (body, content_type) = tokio::time::timeout(self.timeout, self.fetch_body())
            .await
            .map_err(|_| FetchError::Timeout)??;

        tracing::debug!(url = %self.url, bytes = body.len(), "Fetched item list");
        parse_payload(
            &body,
            content_type.as_deref(),
            self.encoding,
            self.log_feed_warnings,
        )
    }
}
