//! Image handling infrastructure.
//!
//! This module provides:
//! - Tiered in-memory caching with in-flight de-duplication
//! - Object-storage URL resolution per quality tier
//! - HTTP retrieval and dimension probing

pub mod decode;
pub mod http_fetcher;
pub mod memory_cache;
pub mod storage_url;

pub use decode::{probe_dimensions, probe_dimensions_blocking};
pub use http_fetcher::{HttpFetcherConfig, HttpImageFetcher};
pub use memory_cache::{CacheStats, DiagnosticsSnapshot, ImageCache};
pub use storage_url::{StorageUrlResolver, TierTransform, TierUrls, is_storage_object_url};
