//! Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::entities::QualityTier;
use crate::infrastructure::image::{HttpFetcherConfig, StorageUrlResolver};

const APP_NAME: &str = "gallery-loader";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Deployment mode. Bulk preloading only runs in diagnostic mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Normal deployed mode.
    #[default]
    Production,
    /// Developer mode with preloading and the diagnostics overlay.
    Diagnostic,
}

impl RunMode {
    /// Returns true in diagnostic mode.
    #[must_use]
    pub const fn is_diagnostic(self) -> bool {
        matches!(self, Self::Diagnostic)
    }
}

/// Application configuration.
#[derive(Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Deployment mode.
    #[serde(default)]
    pub mode: RunMode,

    /// Remote object store.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Display surface behaviour.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Bulk preloader tuning.
    #[serde(default)]
    pub preload: PreloadConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Remote object store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store base URL, e.g. `https://project.supabase.co`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Public bucket holding catalog images.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            bucket: default_bucket(),
        }
    }
}

/// Display surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Tier surfaces walk up to unless asked for high quality.
    #[serde(default)]
    pub default_target: QualityTier,

    /// Pixels added around the viewport when testing visibility.
    #[serde(default = "default_root_margin")]
    pub root_margin_px: f32,

    /// Visible fraction of a surface that triggers loading.
    #[serde(default = "default_visibility_threshold")]
    pub visibility_threshold: f32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_target: QualityTier::Medium,
            root_margin_px: default_root_margin(),
            visibility_threshold: default_visibility_threshold(),
        }
    }
}

/// Bulk preloader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// References per full-resolution batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between full-resolution batches in milliseconds.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds. Unset waits indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// User-Agent header override.
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_bucket() -> String {
    "products".to_string()
}

const fn default_root_margin() -> f32 {
    100.0
}

const fn default_visibility_threshold() -> f32 {
    0.1
}

const fn default_batch_size() -> usize {
    3
}

const fn default_batch_pause_ms() -> u64 {
    200
}

use super::args::CliArgs;

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(mode) = args.mode {
            self.mode = mode;
        }
        if let Some(base_url) = &args.storage_url {
            self.storage.base_url = Some(base_url.clone());
        }
        if let Some(bucket) = &args.bucket {
            self.storage.bucket = bucket.clone();
        }
        if let Some(timeout) = args.timeout_secs {
            self.http.request_timeout_secs = Some(timeout);
        }
    }

    /// Returns default config directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Returns default config file path.
    #[must_use]
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Returns default log file path.
    #[must_use]
    pub fn default_log_path() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.data_dir().join("gallery-loader.log"))
    }

    /// Returns effective log path.
    #[must_use]
    pub fn effective_log_path(&self) -> Option<PathBuf> {
        self.log_path.clone().or_else(Self::default_log_path)
    }

    /// Builds the URL resolver for the configured store.
    #[must_use]
    pub fn url_resolver(&self) -> StorageUrlResolver {
        StorageUrlResolver::new(self.storage.base_url.as_deref(), &self.storage.bucket)
    }

    /// Builds the HTTP fetcher configuration.
    #[must_use]
    pub fn fetcher_config(&self) -> HttpFetcherConfig {
        HttpFetcherConfig {
            timeout: self.http.request_timeout_secs.map(Duration::from_secs),
            user_agent: self.http.user_agent.clone(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: LogLevel::Info,
            mode: RunMode::Production,
            storage: StorageConfig::default(),
            loader: LoaderConfig::default(),
            preload: PreloadConfig::default(),
            http: HttpConfig::default(),
        }
    }
}
