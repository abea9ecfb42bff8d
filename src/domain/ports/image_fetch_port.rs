//! Port definition for retrieving image bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::errors::ImageResult;

/// Port for fetching raw image bytes by URL.
/// Implementations must be thread-safe.
#[async_trait]
pub trait ImageFetchPort: Send + Sync {
    /// Fetches the body at `url`.
    async fn fetch(&self, url: &str) -> ImageResult<Bytes>;
}
