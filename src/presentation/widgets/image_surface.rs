//! Display surface: one on-screen image walking up the quality ladder.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::application::services::TieredFetcher;
use crate::domain::entities::{ImageHandle, ImageReference, QualityTier, SurfaceState};
use crate::domain::errors::{ImageError, ImageResult};
use crate::infrastructure::image::ImageCache;
use crate::presentation::viewport::{Rect, VisibilityObserver};

/// How a surface should load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    /// Start loading at mount instead of waiting for visibility.
    pub priority: bool,
    /// Highest tier to walk up to.
    pub target: QualityTier,
}

impl SurfaceOptions {
    /// Options walking up to `target`.
    #[must_use]
    pub const fn new(target: QualityTier) -> Self {
        Self {
            priority: false,
            target,
        }
    }

    /// Options for enlarged or modal rendering.
    #[must_use]
    pub const fn high_quality() -> Self {
        Self::new(QualityTier::High)
    }

    /// Marks the surface as priority.
    #[must_use]
    pub const fn with_priority(mut self) -> Self {
        self.priority = true;
        self
    }
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self::new(QualityTier::Medium)
    }
}

#[derive(Default)]
struct SurfaceSlot {
    state: SurfaceState,
    binding: Option<ImageHandle>,
    last_error: Option<ImageError>,
    detached: bool,
}

/// State shared between the surface and its walk task.
struct SurfaceCell {
    reference: ImageReference,
    cache: ImageCache,
    slot: Mutex<SurfaceSlot>,
    state_tx: watch::Sender<SurfaceState>,
}

impl SurfaceCell {
    fn transition(&self, state: SurfaceState) -> bool {
        let mut slot = self.slot.lock();
        if slot.detached {
            return false;
        }
        trace!(reference = %self.reference, from = %slot.state, to = %state, "Surface transition");
        slot.state = state;
        self.state_tx.send_replace(state);
        true
    }

    /// Moves `Idle` to `Intersecting`. Only one caller ever wins.
    fn begin_intersecting(&self) -> bool {
        let mut slot = self.slot.lock();
        if slot.detached || !slot.state.is_idle() {
            return false;
        }
        slot.state = SurfaceState::Intersecting;
        self.state_tx.send_replace(SurfaceState::Intersecting);
        true
    }

    /// Binds a new handle and releases the previous one. Discarded once the
    /// surface is unmounted.
    fn bind(&self, handle: ImageHandle) -> bool {
        let mut slot = self.slot.lock();
        if slot.detached {
            return false;
        }
        if let Some(previous) = slot.binding.take() {
            self.cache.release(&self.reference, previous.byte_size());
        }
        self.cache.bind(&self.reference, handle.byte_size());
        slot.binding = Some(handle);
        true
    }

    fn record_error(&self, error: ImageError) {
        self.slot.lock().last_error = Some(error);
    }

    fn detach(&self) {
        let mut slot = self.slot.lock();
        if slot.detached {
            return;
        }
        slot.detached = true;
        if let Some(previous) = slot.binding.take() {
            self.cache.release(&self.reference, previous.byte_size());
        }
    }
}

/// One on-screen instance of an image reference.
///
/// Created when the surface mounts, destroyed on [`ImageSurface::unmount`] or
/// drop. Loading runs on a spawned task, so mounting a priority surface or
/// reporting visibility must happen inside a tokio runtime.
pub struct ImageSurface {
    id: Uuid,
    options: SurfaceOptions,
    fetcher: TieredFetcher,
    cell: Arc<SurfaceCell>,
    token: CancellationToken,
}

impl ImageSurface {
    /// Mounts a surface. Priority surfaces start loading immediately; others
    /// wait for [`ImageSurface::on_viewport`].
    #[must_use]
    pub fn mount(
        reference: ImageReference,
        options: SurfaceOptions,
        fetcher: TieredFetcher,
    ) -> Self {
        let (state_tx, _) = watch::channel(SurfaceState::Idle);
        let cell = Arc::new(SurfaceCell {
            reference,
            cache: fetcher.cache().clone(),
            slot: Mutex::new(SurfaceSlot::default()),
            state_tx,
        });

        let surface = Self {
            id: Uuid::new_v4(),
            options,
            fetcher,
            cell,
            token: CancellationToken::new(),
        };
        debug!(id = %surface.id, reference = %surface.cell.reference, priority = options.priority, "Surface mounted");

        if options.priority {
            surface.start();
        }
        surface
    }

    /// Surface identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// The image reference shown by this surface.
    #[must_use]
    pub fn reference(&self) -> &ImageReference {
        &self.cell.reference
    }

    /// Loading options.
    #[must_use]
    pub const fn options(&self) -> SurfaceOptions {
        self.options
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SurfaceState {
        self.cell.slot.lock().state
    }

    /// Currently bound image, if any.
    #[must_use]
    pub fn binding(&self) -> Option<ImageHandle> {
        self.cell.slot.lock().binding.clone()
    }

    /// Most recent tier failure, for diagnostics.
    #[must_use]
    pub fn last_error(&self) -> Option<ImageError> {
        self.cell.slot.lock().last_error.clone()
    }

    /// Error to render as the "image not available" placeholder.
    ///
    /// Only set when the surface failed without anything to show.
    #[must_use]
    pub fn error(&self) -> Option<ImageError> {
        match self.state() {
            SurfaceState::Failed { shown: None } => {
                Some(ImageError::exhausted(self.cell.reference.as_str()))
            }
            _ => None,
        }
    }

    /// Receiver notified on every state change, for re-rendering.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SurfaceState> {
        self.cell.state_tx.subscribe()
    }

    /// Reports the surface's position. The first report that makes it
    /// visible starts loading; later reports are ignored.
    ///
    /// Returns true if this call started loading.
    pub fn on_viewport(
        &self,
        observer: &VisibilityObserver,
        element: Rect,
        viewport: Rect,
    ) -> bool {
        if !observer.is_visible(element, viewport) || !self.cell.begin_intersecting() {
            return false;
        }
        self.start();
        true
    }

    /// Waits until the surface settles or fails.
    ///
    /// If the surface is unmounted first, returns the state it was left in.
    /// Never resolves for a mounted surface that never becomes visible.
    pub async fn wait_settled(&self) -> SurfaceState {
        let mut rx = self.subscribe();
        tokio::select! {
            biased;
            result = rx.wait_for(SurfaceState::is_terminal) => match result {
                Ok(state) => *state,
                Err(_) => self.state(),
            },
            () = self.token.cancelled() => self.state(),
        }
    }

    /// Cancels pending work and releases the bound image.
    pub fn unmount(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.cell.detach();
        debug!(id = %self.id, reference = %self.cell.reference, "Surface unmounted");
    }

    fn start(&self) {
        if let Some(entry) = self.fetcher.cached_full(&self.cell.reference) {
            trace!(reference = %self.cell.reference, "Preloaded original available");
            self.cell.bind(entry.handle.clone());
            self.cell.transition(SurfaceState::Settled {
                tier: QualityTier::Original,
            });
            return;
        }

        let tiers = tiers_for(&self.fetcher, &self.cell.reference, self.options.target);
        if self.options.priority {
            self.cell.transition(SurfaceState::Loading {
                tier: tiers.first().copied().unwrap_or(self.options.target),
                shown: None,
            });
        }

        tokio::spawn(walk(
            self.cell.clone(),
            self.fetcher.clone(),
            tiers,
            self.options.target,
            self.token.clone(),
        ));
    }
}

impl Drop for ImageSurface {
    fn drop(&mut self) {
        self.unmount();
    }
}

impl std::fmt::Debug for ImageSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSurface")
            .field("id", &self.id)
            .field("reference", &self.cell.reference)
            .field("options", &self.options)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Runs `fut` unless the surface is unmounted first.
async fn unless_cancelled<T>(
    token: &CancellationToken,
    fut: impl Future<Output = ImageResult<T>>,
) -> Option<ImageResult<T>> {
    tokio::select! {
        biased;
        () = token.cancelled() => None,
        result = fut => Some(result),
    }
}

/// Tiers to walk. References the store cannot transform resolve every tier
/// to the same URL, so a single fetch of the target stands for all of them.
fn tiers_for(
    fetcher: &TieredFetcher,
    reference: &ImageReference,
    target: QualityTier,
) -> Vec<QualityTier> {
    if fetcher.resolver().is_transformable(reference) {
        QualityTier::ladder(None, target)
    } else {
        vec![target]
    }
}

async fn walk(
    cell: Arc<SurfaceCell>,
    fetcher: TieredFetcher,
    tiers: Vec<QualityTier>,
    target: QualityTier,
    token: CancellationToken,
) {
    let reference = cell.reference.clone();
    let mut shown = None;

    for tier in tiers {
        if !cell.transition(SurfaceState::Loading { tier, shown }) {
            return;
        }
        let Some(result) = unless_cancelled(&token, fetcher.fetch_tier(&reference, tier)).await
        else {
            return;
        };

        match result {
            Ok(entry) => {
                if !cell.bind(entry.handle.clone()) {
                    return;
                }
                shown = Some(tier);
                cell.transition(SurfaceState::Displayed { tier });
            }
            Err(e) => {
                warn!(reference = %reference, tier = %tier, error = %e, "Tier failed, skipping");
                cell.record_error(e);
            }
        }
    }

    if shown == Some(target) {
        cell.transition(SurfaceState::Settled { tier: target });
        return;
    }
    // The raw original is the URL that just failed.
    if !fetcher.resolver().is_transformable(&reference) {
        cell.transition(SurfaceState::Failed { shown });
        return;
    }

    if !cell.transition(SurfaceState::Loading {
        tier: QualityTier::Original,
        shown,
    }) {
        return;
    }
    let Some(result) = unless_cancelled(&token, fetcher.fetch_direct(&reference)).await else {
        return;
    };

    match result {
        Ok(handle) => {
            if cell.bind(handle) {
                cell.transition(SurfaceState::Settled {
                    tier: QualityTier::Original,
                });
            }
        }
        Err(e) => {
            warn!(reference = %reference, error = %e, "Raw fallback failed");
            cell.record_error(e);
            cell.transition(SurfaceState::Failed { shown });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::entities::ImageDimensions;
    use crate::domain::ports::mocks::MockImageFetcher;
    use crate::infrastructure::image::StorageUrlResolver;

    const BASE: &str = "https://shop.supabase.co";
    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 1000.0, 800.0);

    fn fetcher(mock: &Arc<MockImageFetcher>) -> TieredFetcher {
        TieredFetcher::new(
            ImageCache::new(),
            StorageUrlResolver::new(Some(BASE), "products"),
            mock.clone(),
        )
    }

    async fn settle(surface: &ImageSurface) -> SurfaceState {
        tokio::time::timeout(Duration::from_secs(5), surface.wait_settled())
            .await
            .expect("surface did not settle")
    }

    fn widths(calls: &[String]) -> Vec<&str> {
        calls
            .iter()
            .map(|url| {
                url.split(['?', '&'])
                    .find_map(|p| p.strip_prefix("width="))
                    .unwrap_or("original")
            })
            .collect()
    }

    #[tokio::test]
    async fn test_idle_surface_never_fetches() {
        let mock = MockImageFetcher::new();
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default(),
            fetcher(&mock),
        );

        let offscreen = Rect::new(0.0, 5000.0, 200.0, 200.0);
        assert!(!surface.on_viewport(&VisibilityObserver::default(), offscreen, VIEWPORT));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(surface.state(), SurfaceState::Idle);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_priority_surface_loads_immediately() {
        let mock = MockImageFetcher::new();
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default().with_priority(),
            fetcher(&mock),
        );

        assert_eq!(
            surface.state(),
            SurfaceState::Loading {
                tier: QualityTier::Preview,
                shown: None
            }
        );
        assert_eq!(
            settle(&surface).await,
            SurfaceState::Settled {
                tier: QualityTier::Medium
            }
        );
    }

    #[tokio::test]
    async fn test_tiers_load_strictly_in_order() {
        let mock = MockImageFetcher::new();
        mock.set_delay(Duration::from_millis(5));
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::high_quality().with_priority(),
            fetcher(&mock),
        );

        let mut rx = surface.subscribe();
        let mut seen = Vec::new();
        loop {
            let state = *rx.borrow_and_update();
            if let SurfaceState::Displayed { tier } = state {
                if seen.last() != Some(&tier) {
                    seen.push(tier);
                }
            }
            if state.is_terminal() {
                break;
            }
            rx.changed().await.unwrap();
        }

        assert_eq!(widths(&mock.calls()), vec!["64", "200", "800", "1200"]);
        assert_eq!(mock.max_in_flight(), 1);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(
            surface.state(),
            SurfaceState::Settled {
                tier: QualityTier::High
            }
        );
    }

    #[tokio::test]
    async fn test_intersection_starts_loading() {
        let mock = MockImageFetcher::new();
        mock.set_delay(Duration::from_millis(5));
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default(),
            fetcher(&mock),
        );
        let observer = VisibilityObserver::default();
        let element = Rect::new(0.0, 850.0, 200.0, 200.0);

        assert!(surface.on_viewport(&observer, element, VIEWPORT));
        assert_eq!(surface.state(), SurfaceState::Intersecting);
        assert!(!surface.on_viewport(&observer, element, VIEWPORT));

        assert_eq!(
            settle(&surface).await,
            SurfaceState::Settled {
                tier: QualityTier::Medium
            }
        );
    }

    #[tokio::test]
    async fn test_failed_medium_keeps_preview_when_fallback_fails() {
        let mock = MockImageFetcher::new();
        mock.fail_matching("width=200");
        mock.fail_matching("width=800");
        mock.fail_matching("/object/public/");
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default().with_priority(),
            fetcher(&mock),
        );

        assert_eq!(
            settle(&surface).await,
            SurfaceState::Failed {
                shown: Some(QualityTier::Preview)
            }
        );
        let binding = surface.binding().expect("preview stays bound");
        assert_eq!(binding.dimensions(), ImageDimensions::new(4, 4));
        assert!(surface.error().is_none());
        assert!(surface.last_error().is_some());
    }

    #[tokio::test]
    async fn test_failed_target_falls_back_to_original() {
        let mock = MockImageFetcher::new();
        mock.garbage_matching("width=800");
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default().with_priority(),
            fetcher(&mock),
        );

        assert_eq!(
            settle(&surface).await,
            SurfaceState::Settled {
                tier: QualityTier::Original
            }
        );
        assert!(mock.calls().last().unwrap().contains("/object/public/"));
    }

    #[tokio::test]
    async fn test_everything_failing_shows_placeholder() {
        let mock = MockImageFetcher::new();
        mock.fail_matching("mugs/a.jpg");
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default().with_priority(),
            fetcher(&mock),
        );

        assert_eq!(settle(&surface).await, SurfaceState::Failed { shown: None });
        assert!(surface.binding().is_none());
        assert!(matches!(
            surface.error(),
            Some(ImageError::ExhaustedFallback { .. })
        ));
    }

    #[tokio::test]
    async fn test_preloaded_original_skips_walk() {
        let mock = MockImageFetcher::new();
        let fetcher = fetcher(&mock);
        let reference = ImageReference::new("mugs/a.jpg");
        fetcher.fetch_full(&reference).await.unwrap();
        let before = mock.calls().len();

        let surface =
            ImageSurface::mount(reference, SurfaceOptions::default().with_priority(), fetcher);

        assert_eq!(
            surface.state(),
            SurfaceState::Settled {
                tier: QualityTier::Original
            }
        );
        assert!(surface.binding().is_some());
        assert_eq!(mock.calls().len(), before);
    }

    #[tokio::test]
    async fn test_unmount_discards_late_results() {
        let mock = MockImageFetcher::new();
        mock.set_delay(Duration::from_millis(30));
        let fetcher = fetcher(&mock);
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default().with_priority(),
            fetcher.clone(),
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        surface.unmount();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert!(surface.binding().is_none());
        assert!(surface.state().is_loading());
        assert_eq!(fetcher.cache().diagnostics().bytes_used, 0);
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_settled_returns_after_unmount() {
        let mock = MockImageFetcher::new();
        mock.set_delay(Duration::from_millis(50));
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default().with_priority(),
            fetcher(&mock),
        );

        let (state, ()) = tokio::join!(
            tokio::time::timeout(Duration::from_secs(5), surface.wait_settled()),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                surface.unmount();
            },
        );

        let state = state.expect("wait_settled hung after unmount");
        assert!(state.is_loading());
        assert!(!state.is_terminal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_visibility_reports_start_one_walk() {
        let mock = MockImageFetcher::new();
        mock.set_delay(Duration::from_millis(5));
        let surface = Arc::new(ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default(),
            fetcher(&mock),
        ));
        let element = Rect::new(0.0, 0.0, 200.0, 200.0);

        let reports: Vec<_> = (0..8)
            .map(|_| {
                let surface = surface.clone();
                tokio::spawn(async move {
                    surface.on_viewport(&VisibilityObserver::default(), element, VIEWPORT)
                })
            })
            .collect();

        let mut started = 0;
        for report in reports {
            if report.await.unwrap() {
                started += 1;
            }
        }

        assert_eq!(started, 1);
        assert_eq!(
            settle(&surface).await,
            SurfaceState::Settled {
                tier: QualityTier::Medium
            }
        );
    }

    #[tokio::test]
    async fn test_untransformable_reference_fetched_once() {
        let mock = MockImageFetcher::new();
        let fetcher = fetcher(&mock);
        let surface = ImageSurface::mount(
            ImageReference::new("https://cdn.example.com/hero.png"),
            SurfaceOptions::default().with_priority(),
            fetcher.clone(),
        );

        assert_eq!(
            surface.state(),
            SurfaceState::Loading {
                tier: QualityTier::Medium,
                shown: None
            }
        );
        assert_eq!(
            settle(&surface).await,
            SurfaceState::Settled {
                tier: QualityTier::Medium
            }
        );
        assert_eq!(mock.calls(), vec!["https://cdn.example.com/hero.png"]);
        assert_eq!(fetcher.cache().stats().entries, 1);
    }

    #[tokio::test]
    async fn test_untransformable_failure_is_not_refetched() {
        let mock = MockImageFetcher::new();
        mock.fail_matching("hero.png");
        let surface = ImageSurface::mount(
            ImageReference::new("/assets/hero.png"),
            SurfaceOptions::default().with_priority(),
            fetcher(&mock),
        );

        assert_eq!(settle(&surface).await, SurfaceState::Failed { shown: None });
        assert_eq!(mock.calls().len(), 1);
        assert!(surface.error().is_some());
    }

    #[tokio::test]
    async fn test_bound_bytes_follow_surface() {
        let mock = MockImageFetcher::new();
        let fetcher = fetcher(&mock);
        let surface = ImageSurface::mount(
            ImageReference::new("mugs/a.jpg"),
            SurfaceOptions::default().with_priority(),
            fetcher.clone(),
        );
        settle(&surface).await;

        let bound = surface.binding().unwrap().byte_size();
        assert_eq!(fetcher.cache().diagnostics().bytes_used, bound);

        drop(surface);
        assert_eq!(fetcher.cache().diagnostics().bytes_used, 0);
    }
}
