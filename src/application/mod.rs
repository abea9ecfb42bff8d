//! Application layer coordinating fetches, caching and preloading.

/// Tiered fetching and bulk preloading.
pub mod services;

pub use services::{BulkPreloader, PreloaderConfig, TieredFetcher};
