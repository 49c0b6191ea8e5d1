//! Offline tile resolution
//!
//! [`OfflineResolver`] answers a map layer's per-tile question: is this
//! tile in the selected table? It never touches the network. On a miss the
//! caller falls back to the network URL, or to a placeholder image when
//! forced-offline test mode is on; [`OfflineResolver::tile_src`] makes
//! that choice.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::schema::{SchemaManager, SelectedTable};
use crate::source::TileSource;
use crate::store::StoredValue;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A stored value that cannot be displayed as a tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileDecodeError {
    #[error("stored value for {key} is not a binary blob")]
    NotABlob { key: String },

    #[error("stored blob for {key} is empty")]
    Empty { key: String },
}

/// Why a tile was not served from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissReason {
    NoTableSelected,
    NotFound,
    Decode(TileDecodeError),
    /// The selected table could not be read.
    Store(String),
}

/// A tile served from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTile {
    pub key: String,
    pub data: Bytes,
    pub content_type: &'static str,
}

impl CachedTile {
    fn new(key: String, data: Bytes) -> Self {
        let content_type = image::guess_format(&data)
            .map(|format| format.to_mime_type())
            .unwrap_or(FALLBACK_CONTENT_TYPE);
        Self {
            key,
            data,
            content_type,
        }
    }

    /// Self-contained `data:` URL for the tile bytes.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.data))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Cached(CachedTile),
    Miss(MissReason),
}

impl Resolution {
    pub fn is_cached(&self) -> bool {
        matches!(self, Resolution::Cached(_))
    }
}

/// What a tile element should display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileSrc {
    Cached(CachedTile),
    Network(String),
    Placeholder(String),
}

/// Serves tiles from the selected table.
pub struct OfflineResolver {
    source: Arc<TileSource>,
    schema: Arc<RwLock<SchemaManager>>,
    selected: SelectedTable,
    offline_test: AtomicBool,
    placeholder: parking_lot::RwLock<Option<String>>,
}

impl OfflineResolver {
    pub fn new(
        source: Arc<TileSource>,
        schema: Arc<RwLock<SchemaManager>>,
        selected: SelectedTable,
    ) -> Self {
        Self {
            source,
            schema,
            selected,
            offline_test: AtomicBool::new(false),
            placeholder: parking_lot::RwLock::new(None),
        }
    }

    pub fn with_placeholder(self, url: impl Into<String>) -> Self {
        *self.placeholder.write() = Some(url.into());
        self
    }

    /// Table being served. Shared with whoever created the resolver.
    pub fn selected(&self) -> &SelectedTable {
        &self.selected
    }

    /// Forces misses to the placeholder instead of the network.
    pub fn set_offline_test(&self, enabled: bool) {
        self.offline_test.store(enabled, Ordering::Relaxed);
    }

    pub fn is_offline_test(&self) -> bool {
        self.offline_test.load(Ordering::Relaxed)
    }

    /// Looks up the tile for `url` in the selected table.
    pub async fn resolve(&self, url: &str) -> Resolution {
        let Some(table) = self.selected.get() else {
            trace!(url, "No table selected, cache unavailable");
            return Resolution::Miss(MissReason::NoTableSelected);
        };
        let key = self.source.storage_key_of(url);

        let stored = {
            let schema = self.schema.read().await;
            match schema.table(&table) {
                Ok(handle) => handle.get(&key).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            }
        };

        let resolution = match stored {
            Ok(Some(StoredValue::Blob(data))) if data.is_empty() => {
                Resolution::Miss(MissReason::Decode(TileDecodeError::Empty { key }))
            }
            Ok(Some(StoredValue::Blob(data))) => Resolution::Cached(CachedTile::new(key, data)),
            Ok(Some(StoredValue::Item(_))) => {
                Resolution::Miss(MissReason::Decode(TileDecodeError::NotABlob { key }))
            }
            Ok(None) => Resolution::Miss(MissReason::NotFound),
            Err(reason) => Resolution::Miss(MissReason::Store(reason)),
        };

        match &resolution {
            Resolution::Cached(tile) => {
                debug!(url, table = %table, bytes = tile.data.len(), "Cache hit")
            }
            Resolution::Miss(reason) => debug!(url, table = %table, reason = ?reason, "Cache miss"),
        }
        resolution
    }

    /// Chooses what to display for `url`.
    pub async fn tile_src(&self, url: &str) -> TileSrc {
        match self.resolve(url).await {
            Resolution::Cached(tile) => TileSrc::Cached(tile),
            Resolution::Miss(_) => {
                if self.is_offline_test() {
                    if let Some(placeholder) = self.placeholder.read().clone() {
                        return TileSrc::Placeholder(placeholder);
                    }
                }
                TileSrc::Network(url.to_string())
            }
        }
    }
}
