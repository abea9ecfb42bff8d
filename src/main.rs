use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use gallery_loader::application::{BulkPreloader, PreloaderConfig, TieredFetcher};
use gallery_loader::domain::entities::{Catalog, ImageReference, PreloadScope, QualityTier};
use gallery_loader::infrastructure::{
    AppConfig, CliArgs, Command, ConfigStore, HttpImageFetcher, ImageCache,
};
use gallery_loader::presentation::{
    CacheOverlay, ImageSurface, Rect, SurfaceOptions, VisibilityObserver,
};

const VIEWPORT: Rect = Rect::new(0.0, 0.0, 1280.0, 800.0);
const TILE: f32 = 300.0;

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let store = ConfigStore::locate(args.config.as_deref())?;
    let mut config = store.load()?;
    config.merge_with_args(args);
    Ok(config)
}

fn create_fetcher(config: &AppConfig) -> Result<TieredFetcher> {
    let http = HttpImageFetcher::new(&config.fetcher_config())?;
    Ok(TieredFetcher::new(
        ImageCache::new(),
        config.url_resolver(),
        Arc::new(http),
    ))
}

fn run_resolve(fetcher: &TieredFetcher, reference: &str) {
    let reference = ImageReference::new(reference);
    let resolver = fetcher.resolver();
    if !resolver.is_transformable(&reference) {
        println!("(not a storage object; every tier uses the reference as-is)");
    }
    for tier in QualityTier::ALL {
        println!("{tier:>9}  {}", resolver.resolve(&reference, tier));
    }
}

async fn run_show(
    config: &AppConfig,
    fetcher: TieredFetcher,
    reference: &str,
    high_quality: bool,
    offset_y: Option<f32>,
) -> Result<()> {
    let mut options = if high_quality {
        SurfaceOptions::high_quality()
    } else {
        SurfaceOptions::new(config.loader.default_target)
    };
    if offset_y.is_none() {
        options = options.with_priority();
    }

    let surface = ImageSurface::mount(ImageReference::new(reference), options, fetcher.clone());

    if let Some(y) = offset_y {
        let observer = VisibilityObserver::from(&config.loader);
        let element = Rect::new(0.0, y, TILE, TILE);
        if !surface.on_viewport(&observer, element, VIEWPORT) {
            let ratio = observer.intersection_ratio(element, VIEWPORT);
            info!(reference = %surface.reference(), ratio, "Surface outside viewport, not loading");
            println!("{} (visible ratio {ratio:.2})", surface.state());
            return Ok(());
        }
    }

    let state = surface.wait_settled().await;
    info!(reference = %surface.reference(), state = %state, "Surface settled");

    println!("{state}");
    if let Some(handle) = surface.binding() {
        let dims = handle.dimensions();
        println!(
            "{}x{} ({} bytes)",
            dims.width,
            dims.height,
            handle.byte_size()
        );
    }
    if let Some(error) = surface.error() {
        println!("{error}");
    }
    println!("{}", CacheOverlay::new().render(&fetcher.cache().diagnostics()));

    if state.is_failed() && state.shown().is_none() {
        return Err(eyre!("no tier of {reference} could be displayed"));
    }
    Ok(())
}

fn preload_scope(category: Option<String>, subtype: Option<String>) -> PreloadScope {
    match (category, subtype) {
        (Some(category), Some(subtype)) => PreloadScope::Page { category, subtype },
        (Some(category), None) => PreloadScope::Category(category),
        (None, _) => PreloadScope::Entire,
    }
}

async fn run_preload(
    config: &AppConfig,
    fetcher: TieredFetcher,
    catalog_path: &std::path::Path,
    scope: PreloadScope,
) -> Result<()> {
    if !config.mode.is_diagnostic() {
        warn!(mode = ?config.mode, "Preloading is disabled outside diagnostic mode");
    }

    let content = tokio::fs::read_to_string(catalog_path)
        .await
        .wrap_err_with(|| format!("reading catalog {}", catalog_path.display()))?;
    let catalog: Catalog = serde_json::from_str(&content)
        .wrap_err_with(|| format!("parsing catalog {}", catalog_path.display()))?;
    info!(items = catalog.item_count(), scope = %scope, "Catalog loaded");

    let preloader = BulkPreloader::new(fetcher.clone(), PreloaderConfig::from(config));

    let last = preloader
        .preload(&catalog, &scope, |progress| {
            info!(progress = %progress, "Preload progress");
        })
        .await;

    match last {
        Some(progress) => println!("{progress}"),
        None if !config.mode.is_diagnostic() => {
            println!("nothing preloaded: rerun with --mode diagnostic");
        }
        None => println!("nothing preloaded"),
    }
    println!("{}", fetcher.cache().stats());
    println!("{}", CacheOverlay::new().render(&fetcher.cache().diagnostics()));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = gallery_loader::VERSION, mode = ?config.mode, "Starting gallery-loader");

    let fetcher = create_fetcher(&config)?;

    match args.command {
        Command::Resolve { reference } => {
            run_resolve(&fetcher, &reference);
            Ok(())
        }
        Command::Show {
            reference,
            high_quality,
            offset_y,
        } => run_show(&config, fetcher, &reference, high_quality, offset_y).await,
        Command::Preload {
            catalog,
            category,
            subtype,
        } => {
            let scope = preload_scope(category, subtype);
            run_preload(&config, fetcher, &catalog, scope).await
        }
    }
}
