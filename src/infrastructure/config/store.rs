//! Locating, creating and validating the TOML configuration file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::app_config::AppConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no platform config directory and no --config given")]
    NoConfigLocation,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// The configuration file backing an [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Uses `path_override` if given, otherwise the platform config path.
    ///
    /// # Errors
    /// Returns `NoConfigLocation` if neither is available.
    pub fn locate(path_override: Option<&Path>) -> Result<Self, ConfigError> {
        path_override
            .map(Path::to_path_buf)
            .or_else(AppConfig::default_config_path)
            .map(Self::at)
            .ok_or(ConfigError::NoConfigLocation)
    }

    /// Store backed by exactly `path`.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the configuration.
    ///
    /// A missing file is created with defaults. A file that is not valid TOML
    /// is logged and replaced by defaults in memory, leaving it untouched on
    /// disk. Values that parse but cannot drive the loader are rejected.
    ///
    /// # Errors
    /// Returns `Io` / `TomlSer` if the file cannot be read or the default
    /// written, and `Invalid` for out-of-range values.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Config file not found, writing defaults");
                let config = AppConfig::default();
                write_atomic(&self.path, &config)?;
                return Ok(config);
            }
            Err(e) => return Err(e.into()),
        };

        let config = match toml::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Malformed config file, using defaults");
                AppConfig::default()
            }
        };
        validate(&config)?;
        debug!(path = %self.path.display(), mode = ?config.mode, "Config loaded");
        Ok(config)
    }
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.preload.batch_size == 0 {
        return Err(ConfigError::invalid(
            "preload.batch_size",
            "must be at least 1",
        ));
    }

    let threshold = config.loader.visibility_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ConfigError::invalid(
            "loader.visibility_threshold",
            format!("{threshold} is outside 0.0..=1.0"),
        ));
    }

    let margin = config.loader.root_margin_px;
    if !margin.is_finite() || margin < 0.0 {
        return Err(ConfigError::invalid(
            "loader.root_margin_px",
            format!("{margin} is not a non-negative pixel count"),
        ));
    }

    if config.storage.bucket.trim().is_empty() {
        return Err(ConfigError::invalid("storage.bucket", "must not be empty"));
    }

    if let Some(base_url) = &config.storage.base_url
        && !(base_url.starts_with("https://") || base_url.starts_with("http://"))
    {
        return Err(ConfigError::invalid(
            "storage.base_url",
            format!("{base_url} is not an http(s) URL"),
        ));
    }

    Ok(())
}

/// Writes through a sibling temp file so readers never see a partial file.
fn write_atomic(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
