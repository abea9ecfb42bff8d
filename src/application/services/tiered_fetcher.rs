//! Tier-aware image retrieval shared by display surfaces and the preloader.

use std::sync::Arc;

use tracing::debug;

use crate::domain::entities::{CacheEntry, FullEntry, ImageHandle, ImageReference, QualityTier};
use crate::domain::errors::ImageResult;
use crate::domain::ports::ImageFetchPort;
use crate::infrastructure::image::{ImageCache, StorageUrlResolver, probe_dimensions_blocking};

/// Resolves, fetches and caches tiers of an image.
///
/// Cheap to clone; every clone shares the same cache and fetch port.
#[derive(Clone)]
pub struct TieredFetcher {
    cache: ImageCache,
    resolver: Arc<StorageUrlResolver>,
    fetch: Arc<dyn ImageFetchPort>,
}

impl TieredFetcher {
    /// Creates a fetcher over the given cache, resolver and transport.
    #[must_use]
    pub fn new(
        cache: ImageCache,
        resolver: StorageUrlResolver,
        fetch: Arc<dyn ImageFetchPort>,
    ) -> Self {
        Self {
            cache,
            resolver: Arc::new(resolver),
            fetch,
        }
    }

    /// The shared cache.
    #[must_use]
    pub const fn cache(&self) -> &ImageCache {
        &self.cache
    }

    /// The URL resolver.
    #[must_use]
    pub fn resolver(&self) -> &StorageUrlResolver {
        &self.resolver
    }

    /// Fetches one tier through the cache.
    ///
    /// # Errors
    /// Returns the fetch or decode failure for this tier.
    pub async fn fetch_tier(
        &self,
        reference: &ImageReference,
        tier: QualityTier,
    ) -> ImageResult<Arc<CacheEntry>> {
        let url = self.resolver.resolve(reference, tier);
        self.cache
            .get_or_fetch(reference, tier, &url, self.fetch.clone())
            .await
    }

    /// Fetches the untransformed image through the cache and marks the
    /// reference as fully retrieved.
    ///
    /// # Errors
    /// Returns the fetch or decode failure.
    pub async fn fetch_full(&self, reference: &ImageReference) -> ImageResult<Arc<CacheEntry>> {
        let entry = self.fetch_tier(reference, QualityTier::Original).await?;
        self.cache
            .put_full(reference.clone(), FullEntry::from(entry.as_ref()));
        Ok(entry)
    }

    /// Returns the cached original if the preloader already retrieved it.
    #[must_use]
    pub fn cached_full(&self, reference: &ImageReference) -> Option<Arc<CacheEntry>> {
        if !self.cache.has_full(reference) {
            return None;
        }
        self.cache.get(reference, QualityTier::Original)
    }

    /// Retrieves the raw original, bypassing the cache entirely.
    ///
    /// This is the last-resort render path once every tier has failed.
    ///
    /// # Errors
    /// Returns the fetch or decode failure.
    pub async fn fetch_direct(&self, reference: &ImageReference) -> ImageResult<ImageHandle> {
        let url = self.resolver.original(reference);
        debug!(reference = %reference, url = %url, "Falling back to raw original");
        let bytes = self.fetch.fetch(&url).await?;
        let dimensions = probe_dimensions_blocking(&url, bytes.clone()).await?;
        Ok(ImageHandle::new(bytes, dimensions))
    }
}

impl std::fmt::Debug for TieredFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredFetcher")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}
