//! Domain layer with core image entities and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{ImageReference, QualityTier, SurfaceState};
pub use errors::ImageError;
pub use ports::ImageFetchPort;
