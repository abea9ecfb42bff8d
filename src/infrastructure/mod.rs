//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Image handling (caching, retrieval, URL resolution).
pub mod image;

pub use config::{AppConfig, CliArgs, Command, ConfigStore, LogLevel, RunMode};
pub use image::{
    CacheStats, DiagnosticsSnapshot, HttpFetcherConfig, HttpImageFetcher, ImageCache,
    StorageUrlResolver, TierUrls,
};
