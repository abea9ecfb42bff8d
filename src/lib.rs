//! Gallery Loader - progressive image loading for a product storefront.
//!
//! This crate resolves storage references into quality tiers, walks each
//! on-screen image from a blurred preview up to its target tier, and keeps a
//! process-wide cache that display surfaces and the bulk preloader share.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the tiered fetcher and bulk preloader.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;
/// Presentation layer containing display surfaces and viewport tracking.
pub mod presentation;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "gallery-loader";
