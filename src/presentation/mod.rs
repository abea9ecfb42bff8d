//! Presentation layer with display surfaces and viewport tracking.

/// Viewport intersection checks.
pub mod viewport;
/// Reusable widgets.
pub mod widgets;

pub use viewport::{Rect, VisibilityObserver};
pub use widgets::{CacheOverlay, ImageSurface, SurfaceOptions};
