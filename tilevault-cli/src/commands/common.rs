//! Common types and utilities shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use tilevault::config::ConfigFile;
use tilevault::coord::{LatLngBounds, MAX_LAT, MAX_LNG, MIN_LAT, MIN_LNG};
use tilevault::http::AsyncReqwestClient;
use tilevault::logging::{init_logging, LoggingGuard};
use tilevault::save::SavePipeline;
use tilevault::source::TileSource;
use tilevault::store::DiskStore;
use tilevault::view::{MapView, StaticView};

use crate::error::CliError;

/// Pipeline type used by every command.
pub type Pipeline = SavePipeline<AsyncReqwestClient>;

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    let config = match path {
        Some(path) => ConfigFile::load_from(path)?,
        None => ConfigFile::load()?,
    };
    Ok(config)
}

/// Start file logging as configured. `verbose` mirrors events to stdout.
pub fn start_logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    init_logging(&config.logging.directory, &config.logging.file, verbose)
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}

/// Parse `north,west,south,east` in decimal degrees.
pub fn parse_bounds(value: &str) -> Result<LatLngBounds, String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!(
            "expected 'north,west,south,east', got {} value(s)",
            parts.len()
        ));
    }

    let mut edges = [0.0f64; 4];
    for (edge, part) in edges.iter_mut().zip(&parts) {
        *edge = part
            .parse()
            .map_err(|_| format!("'{}' is not a number", part))?;
    }
    let [north, west, south, east] = edges;

    for lat in [north, south] {
        if !(MIN_LAT..=MAX_LAT).contains(&lat) {
            return Err(format!(
                "latitude {} outside {}..{}",
                lat, MIN_LAT, MAX_LAT
            ));
        }
    }
    for lng in [west, east] {
        if !(MIN_LNG..=MAX_LNG).contains(&lng) {
            return Err(format!(
                "longitude {} outside {}..{}",
                lng, MIN_LNG, MAX_LNG
            ));
        }
    }

    Ok(LatLngBounds::from_edges(north, west, south, east))
}

/// A view of the whole world at zoom 0, for commands that never save.
pub fn world_view() -> StaticView {
    StaticView::new(0, LatLngBounds::from_edges(MAX_LAT, MIN_LNG, MIN_LAT, MAX_LNG))
}

/// Build a pipeline over the configured on-disk store and open it.
pub async fn open_pipeline(
    config: &ConfigFile,
    source: TileSource,
    view: Arc<dyn MapView>,
) -> Result<Pipeline, CliError> {
    let client = AsyncReqwestClient::with_timeout(config.download.timeout)?;
    let store = Arc::new(DiskStore::new(&config.store.directory, config.store.name.clone()));
    let pipeline = SavePipeline::new(source, client, view, store, config.save_config());
    pipeline.open().await?;
    Ok(pipeline)
}

/// Open the configured store for commands that only read or edit tables.
pub async fn open_default_pipeline(config: &ConfigFile) -> Result<Pipeline, CliError> {
    open_pipeline(config, config.tile_source()?, Arc::new(world_view())).await
}
