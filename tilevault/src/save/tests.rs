use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::coord::LatLngBounds;
use crate::http::tests::MockHttpClient;
use crate::schema::SchemaError;
use crate::source::{TileDescriptor, TileSource};
use crate::store::{MemoryStore, StoreEngine, StoredValue};
use crate::view::StaticView;

const TEMPLATE: &str = "https://{s}.tile.test/{z}/{x}/{y}.png";
const BODY: &[u8] = b"\x89PNG tile";

fn london() -> LatLngBounds {
    LatLngBounds::from_edges(51.6, -0.3, 51.4, 0.1)
}

fn westminster() -> LatLngBounds {
    LatLngBounds::from_edges(51.501, -0.121, 51.500, -0.120)
}

fn source() -> TileSource {
    TileSource::new(TEMPLATE).unwrap()
}

fn tiles_for(source: &TileSource, bounds: &LatLngBounds, zooms: &[u8]) -> Vec<TileDescriptor> {
    zooms
        .iter()
        .flat_map(|&z| source.enumerate_tiles(bounds, z).unwrap())
        .collect()
}

async fn open_pipeline(
    source: TileSource,
    client: MockHttpClient,
    view: StaticView,
    config: SaveConfig,
) -> SavePipeline<MockHttpClient> {
    let engine: Arc<dyn StoreEngine> = Arc::new(MemoryStore::new("tiles"));
    let pipeline = SavePipeline::new(source, client, Arc::new(view), engine, config);
    pipeline.open().await.unwrap();
    pipeline
}

fn drain(rx: &mut broadcast::Receiver<SaveEvent>) -> Vec<SaveEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn count(events: &[SaveEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

// =============================================================================
// Progress and events
// =============================================================================

#[tokio::test]
async fn test_full_save_reports_consistent_progress() {
    let client = MockHttpClient::new(BODY).with_stagger(Duration::from_millis(1));
    let pipeline = open_pipeline(
        source(),
        client.clone(),
        StaticView::new(12, london()),
        SaveConfig::default(),
    )
    .await;
    let mut rx = pipeline.subscribe();

    let request = SaveRequest::into_table("london").with_zoom_levels(vec![12]);
    let report = pipeline.save(request).await.unwrap();

    assert_eq!(report.outcome, SaveOutcome::Completed);
    assert_eq!(report.total(), 24);
    assert_eq!(report.saved(), 24);
    assert!(report.is_complete_success());
    assert_eq!(report.status.loaded, 24);
    assert_eq!(report.status.bytes, 24 * BODY.len() as u64);
    assert_eq!(report.status.min_zoom, Some(12));
    assert_eq!(client.calls(), 24);

    let events = drain(&mut rx);
    assert_eq!(count(&events, "save_started"), 1);
    assert_eq!(count(&events, "tile_saved"), 24);
    assert_eq!(count(&events, "load_ended"), 1, "LoadEnded fires exactly once");
    assert_eq!(count(&events, "table_finalized"), 1);

    for event in &events {
        if let SaveEvent::TileSaved(s) | SaveEvent::LoadEnded(s) = event {
            assert!(s.saved + s.failed <= s.loaded, "{:?}", s);
            assert!(s.loaded <= s.total, "{:?}", s);
        }
    }

    assert_eq!(pipeline.status().storage_size, Some(24));
    assert_eq!(pipeline.active_table().as_deref(), Some("london"));
    assert!(!pipeline.is_saving());
}

#[tokio::test]
async fn test_tiles_are_stored_under_normalized_keys() {
    let source = source();
    let tiles = tiles_for(&source, &westminster(), &[14]);
    let pipeline = open_pipeline(
        source,
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await;

    pipeline
        .save(SaveRequest::into_table("w").with_zoom_levels(vec![14]))
        .await
        .unwrap();

    for tile in &tiles {
        assert!(tile.key.starts_with("https://a.tile.test/"), "{}", tile.key);
        let stored = pipeline.get_item(&tile.key).await.unwrap();
        assert_eq!(stored, Some(StoredValue::Blob(Bytes::from_static(BODY))));
    }
}

#[tokio::test]
async fn test_partial_failure_is_counted_not_fatal() {
    let source = source();
    let tiles = tiles_for(&source, &london(), &[12]);
    let client = MockHttpClient::new(BODY);
    client.fail_url(tiles[3].url.clone());
    client.fail_url(tiles[17].url.clone());

    let pipeline = open_pipeline(
        source,
        client,
        StaticView::new(12, london()),
        SaveConfig::default(),
    )
    .await;
    let mut rx = pipeline.subscribe();

    let report = pipeline
        .save(SaveRequest::into_table("london").with_zoom_levels(vec![12]))
        .await
        .unwrap();

    assert_eq!(report.outcome, SaveOutcome::Completed);
    assert!(!report.is_complete_success());
    assert_eq!(report.status.loaded, 24);
    assert_eq!(report.saved(), 22);
    assert_eq!(report.status.failed, 2);

    let mut failed = report.failed_keys().to_vec();
    failed.sort();
    let mut expected = vec![tiles[3].key.clone(), tiles[17].key.clone()];
    expected.sort();
    assert_eq!(failed, expected);

    let events = drain(&mut rx);
    assert_eq!(count(&events, "load_ended"), 1);
    assert_eq!(count(&events, "table_finalized"), 0);
    assert_eq!(pipeline.status().storage_size, Some(22));
}

#[tokio::test]
async fn test_existing_table_is_cleared_before_saving() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await;

    pipeline
        .save(SaveRequest::into_table("w").with_zoom_levels(vec![14]))
        .await
        .unwrap();
    pipeline.put_item("leftover", Bytes::from_static(b"x")).await.unwrap();
    let version = pipeline.version().await;

    let report = pipeline
        .save(SaveRequest::into_table("w").with_zoom_levels(vec![14]))
        .await
        .unwrap();

    assert_eq!(pipeline.get_item("leftover").await.unwrap(), None);
    assert_eq!(pipeline.version().await, version, "Clearing needs no migration");
    assert_eq!(pipeline.table_size("w").await.unwrap(), report.saved() as u64);
}

// =============================================================================
// Zoom level resolution
// =============================================================================

#[tokio::test]
async fn test_derived_zoom_below_floor_rejected_before_fetching() {
    let client = MockHttpClient::new(BODY);
    let pipeline = open_pipeline(
        source(),
        client.clone(),
        StaticView::new(5, london()),
        SaveConfig::default(),
    )
    .await;

    let err = pipeline
        .save(SaveRequest::into_table("low"))
        .await
        .unwrap_err();

    assert!(matches!(err, SaveError::ZoomTooLow { zoom: 5, minimal: 8 }));
    assert_eq!(
        err.to_string(),
        "not allowed to save with zoom level 5 below 8"
    );
    assert_eq!(client.calls(), 0);
    assert!(pipeline.tables().await.is_empty());
    assert!(!pipeline.is_saving());
}

#[tokio::test]
async fn test_derived_zoom_range_uses_layer_max_zoom() {
    let source = source().with_max_zoom(12);
    let expected = tiles_for(&source, &westminster(), &[10, 11, 12]).len();
    let pipeline = open_pipeline(
        source,
        MockHttpClient::new(BODY),
        StaticView::new(10, westminster()).with_max_zoom(18),
        SaveConfig::default(),
    )
    .await;

    let report = pipeline.save(SaveRequest::into_table("w")).await.unwrap();

    assert_eq!(report.total(), expected);
    assert_eq!(report.status.min_zoom, Some(10));
}

#[tokio::test]
async fn test_derived_zoom_max_below_current_saves_current_only() {
    let source = source().with_max_zoom(9);
    let expected = tiles_for(&source, &westminster(), &[11]).len();
    let pipeline = open_pipeline(
        source,
        MockHttpClient::new(BODY),
        StaticView::new(11, westminster()),
        SaveConfig::default(),
    )
    .await;

    let report = pipeline.save(SaveRequest::into_table("w")).await.unwrap();

    assert_eq!(report.total(), expected);
}

#[tokio::test]
async fn test_explicit_zoom_levels_below_floor_are_skipped() {
    let source = source();
    let expected = tiles_for(&source, &westminster(), &[12]).len();
    let pipeline = open_pipeline(
        source,
        MockHttpClient::new(BODY),
        StaticView::new(3, westminster()),
        SaveConfig::default(),
    )
    .await;
    pipeline.set_zoom_levels(Some(vec![3, 12]));

    let report = pipeline.save(SaveRequest::into_table("w")).await.unwrap();

    assert_eq!(report.total(), expected);
    assert_eq!(report.status.min_zoom, Some(12));
}

#[tokio::test]
async fn test_zero_tile_save_completes_immediately() {
    let client = MockHttpClient::new(BODY);
    let pipeline = open_pipeline(
        source(),
        client.clone(),
        StaticView::new(12, london()),
        SaveConfig::default(),
    )
    .await;
    let mut rx = pipeline.subscribe();

    let report = pipeline
        .save(SaveRequest::into_table("empty").with_zoom_levels(vec![]))
        .await
        .unwrap();

    assert_eq!(report.outcome, SaveOutcome::Completed);
    assert_eq!(report.total(), 0);
    assert_eq!(client.calls(), 0);
    assert_eq!(count(&drain(&mut rx), "load_ended"), 1);
    assert!(pipeline.tables().await.is_empty(), "No table without a tile");
}

// =============================================================================
// Concurrency and exclusivity
// =============================================================================

#[tokio::test]
async fn test_fetch_concurrency_respects_limit() {
    let config = SaveConfig {
        concurrency: Some(2),
        ..SaveConfig::default()
    };
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY).with_stagger(Duration::from_millis(2)),
        StaticView::new(12, london()),
        config,
    )
    .await;

    let report = pipeline
        .save(SaveRequest::into_table("london").with_zoom_levels(vec![12]))
        .await
        .unwrap();

    assert_eq!(report.saved(), 24);
    assert!(report.peak_concurrency >= 1);
    assert!(report.peak_concurrency <= 2, "peak {}", report.peak_concurrency);
}

#[tokio::test]
async fn test_default_concurrency_is_one_per_subdomain() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY).with_stagger(Duration::from_millis(2)),
        StaticView::new(12, london()),
        SaveConfig::default(),
    )
    .await;

    let report = pipeline
        .save(SaveRequest::into_table("london").with_zoom_levels(vec![12]))
        .await
        .unwrap();

    assert!(report.peak_concurrency <= 3, "peak {}", report.peak_concurrency);
}

#[tokio::test]
async fn test_second_save_while_running_is_rejected() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY).with_stagger(Duration::from_millis(2)),
        StaticView::new(12, london()),
        SaveConfig::default(),
    )
    .await;

    let first = SaveRequest::into_table("a").with_zoom_levels(vec![12]);
    let second = SaveRequest::into_table("b").with_zoom_levels(vec![12]);
    let (a, b) = tokio::join!(pipeline.save(first), pipeline.save(second));

    assert_eq!(a.unwrap().saved(), 24);
    assert!(matches!(b, Err(SaveError::SaveInProgress)));
    assert_eq!(pipeline.tables().await, vec!["a".to_string()]);
    assert!(!pipeline.is_saving());
}

#[tokio::test]
async fn test_cancelled_save_fetches_nothing() {
    let client = MockHttpClient::new(BODY);
    let pipeline = open_pipeline(
        source(),
        client.clone(),
        StaticView::new(12, london()),
        SaveConfig::default(),
    )
    .await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = pipeline
        .save(
            SaveRequest::into_table("london")
                .with_zoom_levels(vec![12])
                .with_cancellation(cancel),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, SaveOutcome::Cancelled);
    assert!(report.status.was_cancelled);
    assert_eq!(report.saved(), 0);
    assert_eq!(client.calls(), 0);
}

// =============================================================================
// Gates and table selection
// =============================================================================

#[tokio::test]
async fn test_declining_gate_downloads_nothing() {
    let client = MockHttpClient::new(BODY);
    let pipeline = open_pipeline(
        source(),
        client.clone(),
        StaticView::new(12, london()),
        SaveConfig::default(),
    )
    .await
    .with_save_gate(FixedGate(GateDecision::Decline));

    let report = pipeline
        .save(SaveRequest::into_table("london").with_zoom_levels(vec![12]))
        .await
        .unwrap();

    assert_eq!(report.outcome, SaveOutcome::Declined);
    assert_eq!(report.total(), 24, "The gate sees the computed total");
    assert_eq!(client.calls(), 0);
    assert!(pipeline.tables().await.is_empty());
}

#[tokio::test]
async fn test_gate_can_choose_the_table() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await
    .with_save_gate(FixedGate(GateDecision::ProceedInto("chosen".to_string())));

    let report = pipeline
        .save(SaveRequest::default().with_zoom_levels(vec![14]))
        .await
        .unwrap();

    assert_eq!(report.status.target_table.as_deref(), Some("chosen"));
    assert_eq!(pipeline.tables().await, vec!["chosen".to_string()]);
}

#[tokio::test]
async fn test_save_without_table_is_rejected() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await;

    let err = pipeline
        .save(SaveRequest::default().with_zoom_levels(vec![14]))
        .await
        .unwrap_err();

    assert!(matches!(err, SaveError::NoTableSelected));
}

#[tokio::test]
async fn test_item_api_requires_selected_table() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await;

    assert!(matches!(
        pipeline.get_item("k").await,
        Err(SaveError::NoTableSelected)
    ));
    assert!(matches!(
        pipeline.set_table("missing").await,
        Err(SaveError::Schema(SchemaError::UnknownTable(_)))
    ));

    pipeline
        .save(SaveRequest::into_table("w").with_zoom_levels(vec![14]))
        .await
        .unwrap();
    pipeline.set_table("w").await.unwrap();

    let item = serde_json::json!({"note": "hello"});
    pipeline.put_item("meta", item.clone()).await.unwrap();
    assert_eq!(
        pipeline.get_item("meta").await.unwrap(),
        Some(StoredValue::Item(item))
    );
    assert!(pipeline.delete_item("meta").await.unwrap());
    assert!(!pipeline.delete_item("meta").await.unwrap());
}

#[tokio::test]
async fn test_delete_table_clears_selection_and_notifies() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await;
    pipeline
        .save(SaveRequest::into_table("w").with_zoom_levels(vec![14]))
        .await
        .unwrap();
    let mut rx = pipeline.subscribe();

    pipeline.delete_table("w").await.unwrap();

    assert_eq!(pipeline.active_table(), None);
    assert!(pipeline.tables().await.is_empty());
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(
        e,
        SaveEvent::TableListChanged { changed: Some(t), .. } if t == "w"
    )));
}

#[tokio::test]
async fn test_remove_active_table_honours_gate() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await
    .with_removal_gate(FixedGate(GateDecision::Decline));
    pipeline
        .save(SaveRequest::into_table("w").with_zoom_levels(vec![14]))
        .await
        .unwrap();

    assert!(!pipeline.remove_active_table().await.unwrap());
    assert_eq!(pipeline.tables().await, vec!["w".to_string()]);

    pipeline.set_removal_gate(None);
    assert!(pipeline.remove_active_table().await.unwrap());
    assert!(pipeline.tables().await.is_empty());
    assert_eq!(pipeline.status().storage_size, Some(0));
    assert!(matches!(
        pipeline.remove_active_table().await,
        Err(SaveError::NoTableSelected)
    ));
}

#[tokio::test]
async fn test_save_into_new_table_announces_it() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await;
    let mut rx = pipeline.subscribe();

    pipeline
        .save(SaveRequest::into_table("fresh").with_zoom_levels(vec![14]))
        .await
        .unwrap();

    let events = drain(&mut rx);
    let announced: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            SaveEvent::TableListChanged { tables, changed } => Some((tables.clone(), changed.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(
        announced,
        vec![(vec!["fresh".to_string()], Some("fresh".to_string()))]
    );

    // Re-saving clears the table in place, so the list does not change.
    let mut rx = pipeline.subscribe();
    pipeline
        .save(SaveRequest::into_table("fresh").with_zoom_levels(vec![14]))
        .await
        .unwrap();
    assert_eq!(count(&drain(&mut rx), "table_list_changed"), 0);
}

#[tokio::test]
async fn test_min_zoom_is_lowest_of_unsorted_levels() {
    let pipeline = open_pipeline(
        source(),
        MockHttpClient::new(BODY),
        StaticView::new(14, westminster()),
        SaveConfig::default(),
    )
    .await;

    pipeline
        .save(SaveRequest::into_table("w").with_zoom_levels(vec![15, 13]))
        .await
        .unwrap();

    assert_eq!(pipeline.status().min_zoom, Some(13));
}
