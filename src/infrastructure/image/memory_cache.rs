//! In-memory tiered image cache.
//!
//! Entries are keyed by `(reference, tier)` and never evicted; they live until
//! [`ImageCache::clear`]. Concurrent requests for the same key share a single
//! in-flight fetch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::domain::entities::{CacheEntry, FullEntry, ImageReference, QualityTier};
use crate::domain::errors::{ImageError, ImageResult};
use crate::domain::ports::ImageFetchPort;

use super::decode::probe_dimensions_blocking;

type EntryKey = (ImageReference, QualityTier);
type SharedFetch = Shared<BoxFuture<'static, ImageResult<Arc<CacheEntry>>>>;

#[derive(Default)]
struct CacheState {
    entries: HashMap<EntryKey, Arc<CacheEntry>>,
    full: HashMap<ImageReference, FullEntry>,
    in_flight: HashMap<EntryKey, SharedFetch>,
    /// Bumped by `clear`; fetches from an older generation are not stored.
    generation: u64,
}

#[derive(Default)]
struct BoundImages {
    bytes_used: u64,
    sizes: HashMap<ImageReference, u64>,
}

struct CacheInner {
    state: Mutex<CacheState>,
    bound: Mutex<BoundImages>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Process-wide image cache.
///
/// Cloning yields another handle to the same cache, so one instance can be
/// constructed at startup and injected wherever images are loaded.
#[derive(Clone)]
pub struct ImageCache {
    inner: Arc<CacheInner>,
}

impl ImageCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                bound: Mutex::new(BoundImages::default()),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
            }),
        }
    }

    /// Looks up a cached tier.
    #[must_use]
    pub fn get(&self, reference: &ImageReference, tier: QualityTier) -> Option<Arc<CacheEntry>> {
        let state = self.inner.state.lock();
        state.entries.get(&(reference.clone(), tier)).cloned()
    }

    /// Stores an entry unless one already exists for the key, and returns the
    /// entry that ends up cached.
    pub fn put(
        &self,
        reference: ImageReference,
        tier: QualityTier,
        entry: CacheEntry,
    ) -> Arc<CacheEntry> {
        let mut state = self.inner.state.lock();
        let stored = state
            .entries
            .entry((reference, tier))
            .or_insert_with(|| Arc::new(entry));
        debug!(reference = %stored.reference, tier = %tier, size = stored.byte_size, "Stored image in cache");
        stored.clone()
    }

    /// Returns true if the preloader retrieved `reference` at full resolution.
    #[must_use]
    pub fn has_full(&self, reference: &ImageReference) -> bool {
        self.inner.state.lock().full.contains_key(reference)
    }

    /// Returns the full-resolution marker for `reference`.
    #[must_use]
    pub fn get_full(&self, reference: &ImageReference) -> Option<FullEntry> {
        self.inner.state.lock().full.get(reference).copied()
    }

    /// Records that `reference` was retrieved at full resolution.
    pub fn put_full(&self, reference: ImageReference, entry: FullEntry) {
        let mut state = self.inner.state.lock();
        state.full.entry(reference).or_insert(entry);
    }

    /// Returns the cached entry or fetches it, joining an in-flight fetch for
    /// the same key if there is one.
    ///
    /// The fetch itself runs on a spawned task, so it completes and populates
    /// the cache even if every caller stops waiting.
    ///
    /// # Errors
    /// Returns the fetch or decode failure. Failures are not cached.
    pub async fn get_or_fetch(
        &self,
        reference: &ImageReference,
        tier: QualityTier,
        url: &str,
        fetcher: Arc<dyn ImageFetchPort>,
    ) -> ImageResult<Arc<CacheEntry>> {
        let key = (reference.clone(), tier);

        let pending = {
            let mut state = self.inner.state.lock();

            if let Some(entry) = state.entries.get(&key) {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                trace!(reference = %reference, tier = %tier, "Image cache hit");
                return Ok(entry.clone());
            }
            self.inner.misses.fetch_add(1, Ordering::Relaxed);

            if let Some(pending) = state.in_flight.get(&key) {
                trace!(reference = %reference, tier = %tier, "Joining in-flight fetch");
                pending.clone()
            } else {
                trace!(reference = %reference, tier = %tier, "Image cache miss");
                let pending = self.spawn_fetch(key.clone(), url.to_string(), fetcher, state.generation);
                state.in_flight.insert(key, pending.clone());
                pending
            }
        };

        pending.await
    }

    fn spawn_fetch(
        &self,
        key: EntryKey,
        url: String,
        fetcher: Arc<dyn ImageFetchPort>,
        generation: u64,
    ) -> SharedFetch {
        let cache = self.clone();
        let task_url = url.clone();
        let handle = tokio::spawn(async move {
            let result = retrieve(&key, &task_url, fetcher.as_ref()).await;
            cache.complete(&key, generation, result)
        });

        async move {
            handle
                .await
                .unwrap_or_else(|e| Err(ImageError::fetch(url, format!("Fetch task failed: {e}"))))
        }
        .boxed()
        .shared()
    }

    fn complete(
        &self,
        key: &EntryKey,
        generation: u64,
        result: ImageResult<CacheEntry>,
    ) -> ImageResult<Arc<CacheEntry>> {
        let mut state = self.inner.state.lock();
        if state.generation != generation {
            trace!(reference = %key.0, tier = %key.1, "Discarding fetch from before clear");
            return result.map(Arc::new);
        }

        state.in_flight.remove(key);
        let entry = result?;
        debug!(reference = %key.0, tier = %key.1, size = entry.byte_size, "Stored image in cache");
        Ok(state
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(entry))
            .clone())
    }

    /// Drops every entry and forgets in-flight fetches.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        state.entries.clear();
        state.full.clear();
        state.in_flight.clear();
        state.generation += 1;
        info!("Cleared image cache");
    }

    /// Records bytes bound to a display surface.
    pub fn bind(&self, reference: &ImageReference, size: u64) {
        let mut bound = self.inner.bound.lock();
        bound.bytes_used += size;
        bound.sizes.insert(reference.clone(), size);
    }

    /// Records that a display surface released bytes it had bound.
    pub fn release(&self, reference: &ImageReference, size: u64) {
        let mut bound = self.inner.bound.lock();
        bound.bytes_used = bound.bytes_used.saturating_sub(size);
        if bound.sizes.get(reference) == Some(&size) {
            bound.sizes.remove(reference);
        }
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.inner.hits.load(Ordering::Relaxed);
        let misses = self.inner.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        let state = self.inner.state.lock();
        CacheStats {
            entries: state.entries.len(),
            full_entries: state.full.len(),
            pending: state.in_flight.len(),
            hits,
            misses,
            hit_rate,
            memory_estimate: state
                .entries
                .values()
                .map(|entry| entry.dimensions.rgba_bytes())
                .sum(),
        }
    }

    /// Snapshot of the advisory counters for the developer overlay.
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        let stats = self.stats();
        let bound = self.inner.bound.lock();
        let mut sizes: Vec<(ImageReference, u64)> = bound
            .sizes
            .iter()
            .map(|(reference, size)| (reference.clone(), *size))
            .collect();
        sizes.sort();
        DiagnosticsSnapshot {
            bytes_used: bound.bytes_used,
            bound: sizes,
            stats,
        }
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

async fn retrieve(
    key: &EntryKey,
    url: &str,
    fetcher: &dyn ImageFetchPort,
) -> ImageResult<CacheEntry> {
    let bytes = fetcher.fetch(url).await?;
    let dimensions = probe_dimensions_blocking(url, bytes.clone()).await?;
    Ok(CacheEntry::new(key.0.clone(), key.1, bytes, dimensions))
}

/// Statistics about the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    /// Number of cached tier entries.
    pub entries: usize,
    /// Number of references retrieved at full resolution.
    pub full_entries: usize,
    /// Fetches currently in flight.
    pub pending: usize,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Width × height × 4 summed over entries. An approximation.
    pub memory_estimate: u64,
}

impl std::fmt::Display for CacheStats {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} images ({} full), {} pending, ~{:.1} MiB, {:.1}% hit rate ({} hits, {} misses)",
            self.entries,
            self.full_entries,
            self.pending,
            self.memory_estimate as f64 / (1024.0 * 1024.0),
            self.hit_rate,
            self.hits,
            self.misses
        )
    }
}

/// Read-only counters for the developer overlay. Not a stable API.
#[derive(Debug, Clone)]
pub struct DiagnosticsSnapshot {
    /// Bytes currently bound to display surfaces.
    pub bytes_used: u64,
    /// Last bound size per reference.
    pub bound: Vec<(ImageReference, u64)>,
    /// Cache statistics.
    pub stats: CacheStats,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use bytes::Bytes;

    use crate::domain::entities::ImageDimensions;
    use crate::domain::ports::mocks::{MockImageFetcher, png_bytes};

    fn entry(reference: &str, tier: QualityTier, width: u32, height: u32) -> CacheEntry {
        CacheEntry::new(
            ImageReference::new(reference),
            tier,
            png_bytes(width, height),
            ImageDimensions::new(width, height),
        )
    }

    #[test]
    fn test_put_and_get() {
        let cache = ImageCache::new();
        let reference = ImageReference::new("a.png");
        cache.put(reference.clone(), QualityTier::Preview, entry("a.png", QualityTier::Preview, 4, 4));

        assert!(cache.get(&reference, QualityTier::Preview).is_some());
        assert!(cache.get(&reference, QualityTier::Medium).is_none());
    }

    #[test]
    fn test_put_never_overwrites() {
        let cache = ImageCache::new();
        let reference = ImageReference::new("a.png");
        let first = cache.put(reference.clone(), QualityTier::Medium, entry("a.png", QualityTier::Medium, 4, 4));
        let second = cache.put(reference.clone(), QualityTier::Medium, entry("a.png", QualityTier::Medium, 8, 8));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.dimensions, ImageDimensions::new(4, 4));
    }

    #[test]
    fn test_memory_estimate() {
        let cache = ImageCache::new();
        cache.put(ImageReference::new("a"), QualityTier::Preview, entry("a", QualityTier::Preview, 10, 10));
        cache.put(ImageReference::new("b"), QualityTier::Preview, entry("b", QualityTier::Preview, 2, 5));

        let stats = cache.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.memory_estimate, 400 + 40);
    }

    #[test]
    fn test_full_markers() {
        let cache = ImageCache::new();
        let reference = ImageReference::new("a.png");
        assert!(!cache.has_full(&reference));

        let stored = entry("a.png", QualityTier::Original, 6, 6);
        cache.put_full(reference.clone(), FullEntry::from(&stored));

        assert!(cache.has_full(&reference));
        assert_eq!(
            cache.get_full(&reference).map(|full| full.dimensions),
            Some(ImageDimensions::new(6, 6))
        );
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches() {
        let cache = ImageCache::new();
        let fetcher = MockImageFetcher::new();
        let reference = ImageReference::new("a.png");

        let first = cache
            .get_or_fetch(&reference, QualityTier::Preview, "mem://a?width=64", fetcher.clone())
            .await
            .unwrap();
        let second = cache
            .get_or_fetch(&reference, QualityTier::Preview, "mem://a?width=64", fetcher.clone())
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.count_for("mem://a?width=64"), 1);
        assert_eq!(first.dimensions, ImageDimensions::new(4, 4));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let cache = ImageCache::new();
        let fetcher = MockImageFetcher::new();
        fetcher.set_delay(Duration::from_millis(50));
        let reference = ImageReference::new("a.png");
        let url = "mem://a?width=800";

        let (first, second) = tokio::join!(
            cache.get_or_fetch(&reference, QualityTier::Medium, url, fetcher.clone()),
            cache.get_or_fetch(&reference, QualityTier::Medium, url, fetcher.clone()),
        );

        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(fetcher.count_for(url), 1);
        assert_eq!(cache.stats().entries, 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = ImageCache::new();
        let fetcher = MockImageFetcher::new();
        fetcher.fail_matching("broken");
        let reference = ImageReference::new("broken.png");

        let err = cache
            .get_or_fetch(&reference, QualityTier::Medium, "mem://broken", fetcher.clone())
            .await
            .unwrap_err();

        assert!(matches!(err, ImageError::FetchFailure { .. }));
        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_undecodable_bytes() {
        let cache = ImageCache::new();
        let fetcher = MockImageFetcher::new();
        fetcher.garbage_matching("junk");

        let err = cache
            .get_or_fetch(&ImageReference::new("junk"), QualityTier::Preview, "mem://junk", fetcher)
            .await
            .unwrap_err();

        assert!(matches!(err, ImageError::DecodeFailure { .. }));
    }

    #[tokio::test]
    async fn test_clear_then_stats_is_empty() {
        let cache = ImageCache::new();
        let fetcher = MockImageFetcher::new();
        cache
            .get_or_fetch(&ImageReference::new("a"), QualityTier::Preview, "mem://a", fetcher.clone())
            .await
            .unwrap();

        fetcher.set_delay(Duration::from_millis(50));
        let background = {
            let cache = cache.clone();
            let fetcher = fetcher.clone();
            tokio::spawn(async move {
                cache
                    .get_or_fetch(&ImageReference::new("b"), QualityTier::Preview, "mem://b", fetcher)
                    .await
            })
        };
        for _ in 0..100 {
            if cache.stats().pending == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.stats().pending, 1);

        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.pending, 0);

        // The fetch still resolves for its waiter but does not repopulate.
        assert!(background.await.unwrap().is_ok());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_bound_counters() {
        let cache = ImageCache::new();
        let reference = ImageReference::new("a.png");

        cache.bind(&reference, 100);
        cache.bind(&ImageReference::new("b.png"), 50);
        assert_eq!(cache.diagnostics().bytes_used, 150);

        cache.release(&reference, 100);
        let snapshot = cache.diagnostics();
        assert_eq!(snapshot.bytes_used, 50);
        assert_eq!(snapshot.bound, vec![(ImageReference::new("b.png"), 50)]);
    }

    #[test]
    fn test_stats_display() {
        let cache = ImageCache::new();
        cache.put(
            ImageReference::new("a"),
            QualityTier::Preview,
            CacheEntry::new(
                ImageReference::new("a"),
                QualityTier::Preview,
                Bytes::from_static(b"x"),
                ImageDimensions::new(1, 1),
            ),
        );
        assert!(cache.stats().to_string().starts_with("Cache: 1 images (0 full), 0 pending"));
    }
}
