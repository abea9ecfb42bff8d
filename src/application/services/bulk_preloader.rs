//! Background cache warming for catalog images.
//!
//! Preview tiers for everything in scope are requested at once; for a
//! catalog-wide run the originals follow in small sequential batches with a
//! pause in between. Only enabled in diagnostic mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tracing::{debug, info, warn};

use crate::domain::entities::{
    Catalog, ImageReference, PreloadPhase, PreloadProgress, PreloadScope, QualityTier,
};

use crate::infrastructure::config::AppConfig;

use super::tiered_fetcher::TieredFetcher;

/// Default number of originals fetched together.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Default pause between batches.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Configuration for the bulk preloader.
#[derive(Debug, Clone)]
pub struct PreloaderConfig {
    /// Whether preloading runs at all.
    pub enabled: bool,
    /// References per full-resolution batch.
    pub batch_size: usize,
    /// Pause between full-resolution batches.
    pub batch_pause: Duration,
}

impl Default for PreloaderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: DEFAULT_BATCH_PAUSE,
        }
    }
}

/// Enabled only in diagnostic mode, with batch tuning from `[preload]`.
impl From<&AppConfig> for PreloaderConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enabled: config.mode.is_diagnostic(),
            batch_size: config.preload.batch_size,
            batch_pause: Duration::from_millis(config.preload.batch_pause_ms),
        }
    }
}

/// Warms the image cache ahead of navigation.
#[derive(Debug)]
pub struct BulkPreloader {
    fetcher: TieredFetcher,
    config: PreloaderConfig,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BulkPreloader {
    /// Creates a preloader.
    #[must_use]
    pub const fn new(fetcher: TieredFetcher, config: PreloaderConfig) -> Self {
        Self {
            fetcher,
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Returns true while a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Preloads every reference in `scope`, reporting progress as fetches
    /// settle. Failed fetches count as processed.
    ///
    /// Returns the final snapshot, or `None` if preloading is disabled or a
    /// run is already in progress.
    pub async fn preload<F>(
        &self,
        catalog: &Catalog,
        scope: &PreloadScope,
        on_progress: F,
    ) -> Option<PreloadProgress>
    where
        F: Fn(&PreloadProgress) + Send + Sync,
    {
        if !self.config.enabled {
            debug!("Preloading disabled outside diagnostic mode");
            return None;
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Preload already running, ignoring request");
            return None;
        }
        let _guard = RunningGuard(&self.running);

        let references = catalog.references(scope);
        info!(scope = %scope, count = references.len(), "Starting image preload");

        let mut last = self.preview_phase(&references, &on_progress).await;
        if scope.includes_full_phase() && !references.is_empty() {
            last = self.full_phase(&references, &on_progress).await;
        }

        info!(scope = %scope, progress = %last, "Image preload finished");
        Some(last)
    }

    async fn preview_phase<F>(&self, references: &[ImageReference], on_progress: &F) -> PreloadProgress
    where
        F: Fn(&PreloadProgress) + Send + Sync,
    {
        let total = references.len();
        let mut progress = PreloadProgress::new(PreloadPhase::Preview, 0, total, 0, 0);
        on_progress(&progress);

        let fetcher = &self.fetcher;
        let mut pending: FuturesUnordered<_> = references
            .iter()
            .map(|reference| async move {
                (reference, fetcher.fetch_tier(reference, QualityTier::Preview).await)
            })
            .collect();

        let mut loaded = 0;
        while let Some((reference, result)) = pending.next().await {
            if let Err(e) = result {
                warn!(reference = %reference, error = %e, "Preview preload failed");
            }
            loaded += 1;
            progress = PreloadProgress::new(PreloadPhase::Preview, loaded, total, 0, 0);
            on_progress(&progress);
        }

        progress
    }

    async fn full_phase<F>(&self, references: &[ImageReference], on_progress: &F) -> PreloadProgress
    where
        F: Fn(&PreloadProgress) + Send + Sync,
    {
        let total = references.len();
        let batches = batches(references, self.config.batch_size);
        let total_batches = batches.len();
        let fetcher = &self.fetcher;

        let mut loaded = 0;
        let mut progress = PreloadProgress::new(PreloadPhase::Full, 0, total, 0, total_batches);

        for (index, batch) in batches.iter().enumerate() {
            let current = index + 1;
            let mut pending: FuturesUnordered<_> = batch
                .iter()
                .map(|reference| async move { (reference, fetcher.fetch_full(reference).await) })
                .collect();

            while let Some((reference, result)) = pending.next().await {
                if let Err(e) = result {
                    warn!(reference = %reference, error = %e, "Full preload failed");
                }
                loaded += 1;
                progress =
                    PreloadProgress::new(PreloadPhase::Full, loaded, total, current, total_batches);
                on_progress(&progress);
            }

            debug!(batch = current, total_batches, "Preload batch complete");
            on_progress(&progress);

            if current < total_batches && !self.config.batch_pause.is_zero() {
                tokio::time::sleep(self.config.batch_pause).await;
            }
        }

        progress
    }
}

/// Splits references into consecutive batches of at most `size`.
#[must_use]
pub fn batches(references: &[ImageReference], size: usize) -> Vec<Vec<ImageReference>> {
    references.chunks(size.max(1)).map(<[_]>::to_vec).collect()
}
