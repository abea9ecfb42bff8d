//! Application configuration.

pub mod app_config;
pub mod args;
pub mod store;

pub use app_config::{
    AppConfig, HttpConfig, LoaderConfig, LogLevel, PreloadConfig, RunMode, StorageConfig,
};
pub use args::{CliArgs, Command};
pub use store::{ConfigError, ConfigStore};
