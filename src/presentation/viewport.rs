//! Viewport intersection checks that decide when a surface starts loading.

use crate::infrastructure::config::LoaderConfig;

/// Axis-aligned rectangle in layout pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl Rect {
    /// Creates a rectangle.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in square pixels.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Grows the rectangle by `margin` on every side.
    #[must_use]
    pub fn expand(&self, margin: f32) -> Self {
        Self::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
    }

    /// Overlapping region, if any.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        (right >= left && bottom >= top).then(|| Self::new(left, top, right - left, bottom - top))
    }
}

/// Decides visibility with a root margin and a minimum visible fraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityObserver {
    root_margin: f32,
    threshold: f32,
}

impl VisibilityObserver {
    /// Pixels added around the viewport by default.
    pub const DEFAULT_ROOT_MARGIN: f32 = 100.0;
    /// Visible fraction that counts as intersecting by default.
    pub const DEFAULT_THRESHOLD: f32 = 0.1;

    /// Creates an observer. The threshold is clamped to `0.0..=1.0`.
    #[must_use]
    pub fn new(root_margin: f32, threshold: f32) -> Self {
        Self {
            root_margin: root_margin.max(0.0),
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Fraction of `element` inside the margin-expanded viewport.
    #[must_use]
    pub fn intersection_ratio(&self, element: Rect, viewport: Rect) -> f32 {
        let root = viewport.expand(self.root_margin);
        let Some(overlap) = element.intersection(&root) else {
            return 0.0;
        };
        let area = element.area();
        if area <= 0.0 {
            return 1.0;
        }
        (overlap.area() / area).min(1.0)
    }

    /// Returns true once enough of `element` is within reach of the viewport.
    #[must_use]
    pub fn is_visible(&self, element: Rect, viewport: Rect) -> bool {
        let root = viewport.expand(self.root_margin);
        if element.intersection(&root).is_none() {
            return false;
        }
        self.intersection_ratio(element, viewport) >= self.threshold
    }
}

impl Default for VisibilityObserver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ROOT_MARGIN, Self::DEFAULT_THRESHOLD)
    }
}

impl From<&LoaderConfig> for VisibilityObserver {
    fn from(config: &LoaderConfig) -> Self {
        Self::new(config.root_margin_px, config.visibility_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEWPORT: Rect = Rect::new(0.0, 0.0, 1000.0, 800.0);

    #[test]
    fn test_inside_viewport() {
        let observer = VisibilityObserver::default();
        let element = Rect::new(10.0, 10.0, 200.0, 200.0);
        assert!(observer.is_visible(element, VIEWPORT));
        assert!((observer.intersection_ratio(element, VIEWPORT) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_within_root_margin() {
        let observer = VisibilityObserver::default();
        // Starts 50px below the fold, fully within the 100px margin.
        let element = Rect::new(0.0, 850.0, 200.0, 40.0);
        assert!(observer.is_visible(element, VIEWPORT));
    }

    #[test]
    fn test_below_threshold() {
        let observer = VisibilityObserver::default();
        // Only 5px of 200px reach into the margin: 2.5%.
        let element = Rect::new(0.0, 895.0, 200.0, 200.0);
        assert!(!observer.is_visible(element, VIEWPORT));
    }

    #[test]
    fn test_built_from_loader_config() {
        let config = LoaderConfig {
            root_margin_px: 0.0,
            visibility_threshold: 0.5,
            ..LoaderConfig::default()
        };
        let observer = VisibilityObserver::from(&config);

        // 30% inside the viewport: visible by default, not with this config.
        let element = Rect::new(0.0, 740.0, 200.0, 200.0);
        assert!(VisibilityObserver::default().is_visible(element, VIEWPORT));
        assert!(!observer.is_visible(element, VIEWPORT));

        let defaults = VisibilityObserver::from(&LoaderConfig::default());
        assert_eq!(defaults, VisibilityObserver::default());
    }

    #[test]
    fn test_far_away() {
        let observer = VisibilityObserver::default();
        let element = Rect::new(0.0, 5000.0, 200.0, 200.0);
        assert!(!observer.is_visible(element, VIEWPORT));
        assert!(observer.intersection_ratio(element, VIEWPORT).abs() < f32::EPSILON);
    }
}
