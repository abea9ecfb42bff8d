pub mod bulk_preloader;
pub mod tiered_fetcher;

pub use bulk_preloader::{
    BulkPreloader, DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_SIZE, PreloaderConfig, batches,
};
pub use tiered_fetcher::TieredFetcher;
