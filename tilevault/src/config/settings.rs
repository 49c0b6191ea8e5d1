//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.

use std::path::PathBuf;

use crate::save::SaveConfig;
use crate::source::{SourceError, TileSource};

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub store: StoreSettings,
    pub source: SourceSettings,
    pub save: SaveSettings,
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

/// On-disk store location.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    /// Directory holding one subdirectory per store.
    pub directory: PathBuf,
    /// Store name.
    pub name: String,
}

/// Default tile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    /// URL template with `{s}`, `{z}`, `{x}`, `{y}` placeholders.
    pub url: String,
    pub subdomains: Vec<String>,
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Layer maximum zoom, if the layer has one.
    pub max_zoom: Option<u8>,
}

/// Save defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSettings {
    /// Saves derived from a view below this zoom are refused.
    pub minimal_zoom: u8,
    /// Fallback maximum zoom of a derived save.
    pub max_zoom: u8,
    /// Simultaneous downloads. 0 means one per subdomain.
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSettings {
    /// Timeout in seconds for HTTP requests.
    pub timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl ConfigFile {
    /// Directory of the configured store.
    pub fn store_path(&self) -> PathBuf {
        self.store.directory.join(&self.store.name)
    }

    /// Builds the configured tile layer.
    pub fn tile_source(&self) -> Result<TileSource, SourceError> {
        let mut source = TileSource::new(&self.source.url)?
            .with_subdomains(self.source.subdomains.iter().cloned())
            .with_tile_size(self.source.tile_size);
        if let Some(max_zoom) = self.source.max_zoom {
            source = source.with_max_zoom(max_zoom);
        }
        Ok(source)
    }

    /// Runtime save options derived from `[save]`.
    pub fn save_config(&self) -> SaveConfig {
        SaveConfig {
            minimal_zoom: self.save.minimal_zoom,
            max_zoom: Some(self.save.max_zoom),
            concurrency: (self.save.concurrency > 0).then_some(self.save.concurrency),
            ..SaveConfig::default()
        }
    }
}
