//! Domain entity definitions.

mod catalog;
mod image;
mod progress;
mod surface;

pub use catalog::{Catalog, CatalogItem, Category, PreloadScope, Subtype};
pub use image::{
    CacheEntry, FullEntry, ImageDimensions, ImageHandle, ImageReference, QualityTier,
};
pub use progress::{PreloadPhase, PreloadProgress};
pub use surface::SurfaceState;
