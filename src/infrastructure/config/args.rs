use super::app_config::{LogLevel, RunMode};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "gallery-loader",
    version,
    about = "Progressive image loading and cache diagnostics for the storefront gallery",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Deployment mode.
    #[arg(long, value_enum, global = true)]
    pub mode: Option<RunMode>,

    /// Object store base URL.
    #[arg(long, value_name = "URL", env = "GALLERY_STORAGE_URL", global = true)]
    pub storage_url: Option<String>,

    /// Public bucket holding catalog images.
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the URL of every quality tier for a reference.
    Resolve {
        /// Image reference (URL, site path or storage path).
        reference: String,
    },
    /// Load a reference through a display surface and report where it settled.
    Show {
        /// Image reference (URL, site path or storage path).
        reference: String,

        /// Walk up to the high tier instead of the configured default.
        #[arg(long)]
        high_quality: bool,

        /// Lay the image out this many pixels down the page and load it only
        /// if the viewport observer reports it visible.
        #[arg(long, value_name = "PX", allow_negative_numbers = true)]
        offset_y: Option<f32>,
    },
    /// Warm the cache for a catalog file (JSON).
    Preload {
        /// Catalog file path.
        catalog: PathBuf,

        /// Restrict to one category.
        #[arg(long)]
        category: Option<String>,

        /// Restrict to one subtype page of the category.
        #[arg(long, requires = "category")]
        subtype: Option<String>,
    },
}
