//! HTTP adapter for the image fetch port.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, trace};

use crate::domain::errors::{ImageError, ImageResult};
use crate::domain::ports::ImageFetchPort;

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcherConfig {
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// User-Agent header override.
    pub user_agent: Option<String>,
}

/// Fetches image bytes over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    /// Creates a fetcher with the given configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &HttpFetcherConfig) -> ImageResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("{}/{}", crate::NAME, crate::VERSION));
        builder = builder.user_agent(user_agent);

        let http_client = builder.build().map_err(|e| {
            ImageError::fetch("<client>", format!("Failed to create HTTP client: {e}"))
        })?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl ImageFetchPort for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> ImageResult<Bytes> {
        trace!(url = %url, "Requesting image");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::fetch(url, format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ImageError::fetch(
                url,
                format!(
                    "HTTP {}: {}",
                    response.status().as_u16(),
                    response.status().canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImageError::fetch(url, format!("Failed to read body: {e}")))?;

        debug!(url = %url, size = bytes.len(), "Image downloaded");
        Ok(bytes)
    }
}
