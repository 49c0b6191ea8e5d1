//! Integration tests for offline serving from an on-disk store.
//!
//! These tests save a region with a working network, then reopen the same
//! store directory with a network that fails every request:
//! - Tables and tiles survive the restart
//! - The resolver serves tiles under any subdomain
//! - Misses fall back to the network URL or the offline placeholder
//!
//! Run with: `cargo test --test offline_integration`

use std::sync::Arc;

use bytes::Bytes;
use tempfile::TempDir;

use tilevault::coord::LatLngBounds;
use tilevault::http::{AsyncHttpClient, TileFetchError};
use tilevault::resolver::{MissReason, Resolution, TileSrc};
use tilevault::save::{SaveConfig, SaveError, SavePipeline, SaveRequest};
use tilevault::source::TileSource;
use tilevault::store::DiskStore;
use tilevault::view::StaticView;

const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
const TEMPLATE: &str = "https://{s}.tiles.test/{z}/{x}/{y}.jpg";

// ============================================================================
// Test Helpers
// ============================================================================

/// A network that always answers with the same tile.
struct OnlineClient;

impl AsyncHttpClient for OnlineClient {
    async fn get(&self, _url: &str) -> Result<Bytes, TileFetchError> {
        Ok(Bytes::from_static(JPEG))
    }
}

/// A network that is down.
struct OfflineClient;

impl AsyncHttpClient for OfflineClient {
    async fn get(&self, url: &str) -> Result<Bytes, TileFetchError> {
        Err(TileFetchError::Request {
            url: url.to_string(),
            reason: "network unreachable".to_string(),
        })
    }
}

fn bounds() -> LatLngBounds {
    LatLngBounds::from_edges(45.95, 7.6, 45.9, 7.7)
}

fn source() -> TileSource {
    TileSource::new(TEMPLATE).unwrap()
}

async fn create_pipeline<C: AsyncHttpClient>(dir: &TempDir, client: C) -> SavePipeline<C> {
    let store = Arc::new(DiskStore::new(dir.path(), "tile-maps"));
    let view = Arc::new(StaticView::new(12, bounds()));
    let pipeline = SavePipeline::new(source(), client, view, store, SaveConfig::default());
    pipeline.open().await.unwrap();
    pipeline
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_saved_tiles_are_served_after_restart() {
    let dir = TempDir::new().unwrap();
    let tiles = source().enumerate_tiles(&bounds(), 12).unwrap();

    {
        let online = create_pipeline(&dir, OnlineClient).await;
        let report = online
            .save(SaveRequest::into_table("alps").with_zoom_levels(vec![12]))
            .await
            .unwrap();
        assert!(report.is_complete_success());
        assert_eq!(report.saved(), tiles.len());
    }

    let offline = create_pipeline(&dir, OfflineClient).await;
    assert_eq!(offline.tables().await, vec!["alps"]);
    assert_eq!(offline.table_size("alps").await.unwrap(), tiles.len() as u64);

    offline.set_table("alps").await.unwrap();
    let resolver = offline.resolver();

    for tile in &tiles {
        // Ask for every tile through the same, non-canonical subdomain.
        let url = format!("https://c.{}", &tile.url["https://a.".len()..]);
        let Resolution::Cached(cached) = resolver.resolve(&url).await else {
            panic!("{} should be cached", url);
        };
        assert_eq!(cached.key, tile.key);
        assert_eq!(cached.content_type, "image/jpeg");
        assert_eq!(cached.data, Bytes::from_static(JPEG));
    }
}

#[tokio::test]
async fn test_offline_misses_fall_back() {
    let dir = TempDir::new().unwrap();
    let pipeline = create_pipeline(&dir, OnlineClient).await;
    pipeline
        .save(SaveRequest::into_table("alps").with_zoom_levels(vec![12]))
        .await
        .unwrap();
    pipeline.set_table("alps").await.unwrap();

    let uncached = "https://c.tiles.test/3/4/2.jpg";
    let resolver = pipeline.resolver().with_placeholder("/static/offline.png");

    assert_eq!(
        resolver.resolve(uncached).await,
        Resolution::Miss(MissReason::NotFound)
    );
    assert_eq!(
        resolver.tile_src(uncached).await,
        TileSrc::Network(uncached.to_string())
    );

    resolver.set_offline_test(true);
    assert_eq!(
        resolver.tile_src(uncached).await,
        TileSrc::Placeholder("/static/offline.png".to_string())
    );
}

#[tokio::test]
async fn test_offline_save_leaves_existing_table_untouched() {
    let dir = TempDir::new().unwrap();
    {
        let online = create_pipeline(&dir, OnlineClient).await;
        online
            .save(SaveRequest::into_table("alps").with_zoom_levels(vec![12]))
            .await
            .unwrap();
    }
    let offline = create_pipeline(&dir, OfflineClient).await;
    let before = offline.table_size("alps").await.unwrap();

    let report = offline
        .save(SaveRequest::into_table("alps").with_zoom_levels(vec![12]))
        .await
        .unwrap();

    assert_eq!(report.saved(), 0);
    assert_eq!(report.status.failed, report.total());
    assert_eq!(
        offline.table_size("alps").await.unwrap(),
        before,
        "A save with no successful download must not clear the table"
    );
}

#[tokio::test]
async fn test_dropped_table_stays_dropped() {
    let dir = TempDir::new().unwrap();
    {
        let pipeline = create_pipeline(&dir, OnlineClient).await;
        pipeline
            .save(SaveRequest::into_table("alps").with_zoom_levels(vec![12]))
            .await
            .unwrap();
        pipeline.delete_table("alps").await.unwrap();
    }

    let reopened = create_pipeline(&dir, OfflineClient).await;
    assert!(reopened.tables().await.is_empty());
    assert!(matches!(
        reopened.set_table("alps").await,
        Err(SaveError::Schema(_))
    ));
}
