//! Port definitions for external services.

mod image_fetch_port;

pub use image_fetch_port::ImageFetchPort;
