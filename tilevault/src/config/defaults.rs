//! Default values and the `ConfigFile::default()` implementation.

use std::path::PathBuf;

use super::settings::*;
use crate::save::{DEFAULT_MAX_ZOOM, DEFAULT_MINIMAL_ZOOM};
use crate::source::{DEFAULT_SUBDOMAINS, DEFAULT_TILE_SIZE};

/// Store name used when none is configured.
pub const DEFAULT_STORE_NAME: &str = "tile-maps";

/// OpenStreetMap standard tile layer.
pub const DEFAULT_SOURCE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";

/// Default HTTP timeout in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = crate::http::DEFAULT_TIMEOUT_SECS;

pub const DEFAULT_LOG_FILE: &str = "tilevault.log";

/// Default root for on-disk stores (`<data dir>/tilevault`).
pub fn default_store_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tilevault")
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            store: StoreSettings {
                directory: default_store_directory(),
                name: DEFAULT_STORE_NAME.to_string(),
            },
            source: SourceSettings {
                url: DEFAULT_SOURCE_URL.to_string(),
                subdomains: DEFAULT_SUBDOMAINS.iter().map(|s| s.to_string()).collect(),
                tile_size: DEFAULT_TILE_SIZE,
                max_zoom: None,
            },
            save: SaveSettings {
                minimal_zoom: DEFAULT_MINIMAL_ZOOM,
                max_zoom: DEFAULT_MAX_ZOOM,
                concurrency: 0,
            },
            download: DownloadSettings {
                timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            },
            logging: LoggingSettings {
                directory: super::file::config_directory(),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}
