//! tilevault - offline map tile storage
//!
//! Saves the tiles of a map region into named tables of a versioned
//! key-value store and serves them back when the network is unavailable.
//!
//! # High-Level API
//!
//! ```ignore
//! use std::sync::Arc;
//! use tilevault::coord::LatLngBounds;
//! use tilevault::http::AsyncReqwestClient;
//! use tilevault::save::{SaveConfig, SavePipeline, SaveRequest};
//! use tilevault::source::TileSource;
//! use tilevault::store::DiskStore;
//! use tilevault::view::StaticView;
//!
//! let bounds = LatLngBounds::from_edges(51.6, -0.3, 51.4, 0.1);
//! let pipeline = SavePipeline::new(
//!     TileSource::new("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png")?,
//!     AsyncReqwestClient::new()?,
//!     Arc::new(StaticView::new(12, bounds)),
//!     Arc::new(DiskStore::new("/var/lib/tilevault", "tile-maps")),
//!     SaveConfig::default(),
//! );
//! pipeline.open().await?;
//! let report = pipeline.save(SaveRequest::into_table("london")).await?;
//!
//! // Later, possibly offline
//! let resolver = pipeline.resolver();
//! pipeline.set_table("london").await?;
//! let tile = resolver.tile_src("https://b.tile.openstreetmap.org/12/2046/1361.png").await;
//! ```

pub mod config;
pub mod coord;
pub mod http;
pub mod logging;
pub mod resolver;
pub mod save;
pub mod schema;
pub mod source;
pub mod store;
pub mod view;

/// Version of the tilevault library and CLI.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
