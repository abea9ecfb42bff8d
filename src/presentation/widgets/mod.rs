//! Reusable display components.

mod cache_overlay;
mod image_surface;

pub use cache_overlay::CacheOverlay;
pub use image_surface::{ImageSurface, SurfaceOptions};
