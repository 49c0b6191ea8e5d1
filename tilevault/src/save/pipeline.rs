//! The save pipeline.
//!
//! # Flow
//!
//! 1. Resolve zoom levels and bounds (request, then config, then view)
//! 2. Enumerate tiles per zoom level into one ordered list
//! 3. Reset status and consult the save gate
//! 4. Download tiles concurrently through a sliding window; the first
//!    successful download creates or clears the target table
//! 5. Persist each tile and count progress; completion is detected when
//!    the counters reach the precomputed total

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::SaveError;
use super::events::{EventBus, SaveEvent};
use super::gate::{GateDecision, RemovalGate, SaveGate};
use super::limiter::ConcurrencyLimiter;
use super::materialize::TableMaterializer;
use super::request::{SaveConfig, SaveOutcome, SaveReport, SaveRequest};
use super::status::SaveStatus;
use crate::coord::LatLngBounds;
use crate::http::AsyncHttpClient;
use crate::resolver::OfflineResolver;
use crate::schema::{SchemaError, SchemaManager, SelectedTable};
use crate::source::{TileDescriptor, TileSource};
use crate::store::{StoreEngine, StoredValue};
use crate::view::MapView;

/// Result of processing one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileOutcome {
    Saved,
    Failed,
    Cancelled,
}

/// Marks a save as running for as long as it lives.
struct SaveGuard<'a>(&'a AtomicBool);

impl<'a> SaveGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Downloads tile regions into tables of a store.
///
/// One pipeline runs at most one save at a time; a second concurrent
/// [`save`](Self::save) fails with [`SaveError::SaveInProgress`].
pub struct SavePipeline<C: AsyncHttpClient> {
    source: Arc<TileSource>,
    client: Arc<C>,
    view: Arc<dyn MapView>,
    schema: Arc<RwLock<SchemaManager>>,
    /// Table for the item API, storage size and removal.
    active: SelectedTable,
    /// Table the resolver serves from.
    serving: SelectedTable,
    config: parking_lot::RwLock<SaveConfig>,
    save_gate: parking_lot::RwLock<Option<Arc<dyn SaveGate>>>,
    removal_gate: parking_lot::RwLock<Option<Arc<dyn RemovalGate>>>,
    status: Arc<Mutex<SaveStatus>>,
    events: EventBus,
    in_progress: AtomicBool,
}

impl<C: AsyncHttpClient> SavePipeline<C> {
    pub fn new(
        source: TileSource,
        client: C,
        view: Arc<dyn MapView>,
        engine: Arc<dyn StoreEngine>,
        config: SaveConfig,
    ) -> Self {
        let events = EventBus::new(config.event_capacity);
        Self {
            source: Arc::new(source),
            client: Arc::new(client),
            view,
            schema: Arc::new(RwLock::new(SchemaManager::new(engine))),
            active: SelectedTable::new(),
            serving: SelectedTable::new(),
            config: parking_lot::RwLock::new(config),
            save_gate: parking_lot::RwLock::new(None),
            removal_gate: parking_lot::RwLock::new(None),
            status: Arc::new(Mutex::new(SaveStatus::new())),
            events,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn with_save_gate(self, gate: impl SaveGate + 'static) -> Self {
        self.set_save_gate(Some(Arc::new(gate)));
        self
    }

    pub fn with_removal_gate(self, gate: impl RemovalGate + 'static) -> Self {
        self.set_removal_gate(Some(Arc::new(gate)));
        self
    }

    pub fn set_save_gate(&self, gate: Option<Arc<dyn SaveGate>>) {
        *self.save_gate.write() = gate;
    }

    pub fn set_removal_gate(&self, gate: Option<Arc<dyn RemovalGate>>) {
        *self.removal_gate.write() = gate;
    }

    pub fn source(&self) -> &Arc<TileSource> {
        &self.source
    }

    pub fn schema(&self) -> Arc<RwLock<SchemaManager>> {
        Arc::clone(&self.schema)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current status.
    pub fn status(&self) -> SaveStatus {
        self.status.lock().clone()
    }

    pub fn is_saving(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn config(&self) -> SaveConfig {
        self.config.read().clone()
    }

    /// Sets the explicit zoom levels used by later saves.
    pub fn set_zoom_levels(&self, zoom_levels: Option<Vec<u8>>) {
        self.config.write().zoom_levels = zoom_levels;
    }

    /// Sets the area saved by later saves.
    pub fn set_bounds(&self, bounds: Option<LatLngBounds>) {
        self.config.write().bounds = bounds;
    }

    /// Creates a resolver serving from this pipeline's selected table.
    pub fn resolver(&self) -> OfflineResolver {
        OfflineResolver::new(
            Arc::clone(&self.source),
            Arc::clone(&self.schema),
            self.serving.clone(),
        )
    }

    /// Opens the store and publishes its table list.
    pub async fn open(&self) -> Result<Vec<String>, SaveError> {
        let (tables, version) = {
            let mut schema = self.schema.write().await;
            let tables = schema.open().await?.to_vec();
            (tables, schema.version())
        };
        info!(tables = ?tables, version, "Store opened");

        self.status.lock().tables = tables.clone();
        self.events.publish(SaveEvent::TableListChanged {
            tables: tables.clone(),
            changed: None,
        });
        Ok(tables)
    }

    pub async fn tables(&self) -> Vec<String> {
        self.schema.read().await.tables().to_vec()
    }

    /// Committed schema version of the store.
    pub async fn version(&self) -> u32 {
        self.schema.read().await.version()
    }

    /// Selects the table used by the item API and served by the resolver.
    pub async fn set_table(&self, table: &str) -> Result<(), SaveError> {
        if !self.schema.read().await.contains(table) {
            return Err(SchemaError::UnknownTable(table.to_string()).into());
        }
        self.active.set(table);
        self.serving.set(table);
        debug!(table, "Table selected");
        Ok(())
    }

    pub fn active_table(&self) -> Option<String> {
        self.active.get()
    }

    /// Drops a table and deselects it wherever it is selected.
    pub async fn delete_table(&self, table: &str) -> Result<(), SaveError> {
        if self.is_saving() {
            return Err(SaveError::SaveInProgress);
        }

        let tables = {
            let mut schema = self.schema.write().await;
            schema.drop_table(table).await?;
            schema.tables().to_vec()
        };
        self.active.clear_if(table);
        self.serving.clear_if(table);
        info!(table, "Table dropped");

        self.status.lock().tables = tables.clone();
        self.events.publish(SaveEvent::TableListChanged {
            tables,
            changed: Some(table.to_string()),
        });
        Ok(())
    }

    /// Drops the active table after consulting the removal gate.
    ///
    /// Returns false if the gate declined.
    pub async fn remove_active_table(&self) -> Result<bool, SaveError> {
        let table = self.active.get().ok_or(SaveError::NoTableSelected)?;

        let gate = self.removal_gate.read().clone();
        if let Some(gate) = gate {
            let status = self.status();
            if !gate.confirm(&table, &status).await {
                info!(table = %table, "Table removal declined");
                return Ok(false);
            }
        }

        self.delete_table(&table).await?;

        let snapshot = {
            let mut status = self.status.lock();
            status.storage_size = Some(0);
            status.clone()
        };
        self.events.publish(SaveEvent::StorageSizeChanged(snapshot));
        Ok(true)
    }

    /// Row count of `table`.
    pub async fn table_size(&self, table: &str) -> Result<u64, SaveError> {
        let schema = self.schema.read().await;
        Ok(schema.table(table)?.count().await?)
    }

    /// Counts the rows of the active table and publishes the result.
    pub async fn refresh_storage_size(&self) -> Result<u64, SaveError> {
        let table = self.active.get().ok_or(SaveError::NoTableSelected)?;
        let count = self.table_size(&table).await?;

        let snapshot = {
            let mut status = self.status.lock();
            status.storage_size = Some(count);
            status.clone()
        };
        self.events.publish(SaveEvent::StorageSizeChanged(snapshot));
        Ok(count)
    }

    /// Inserts or replaces an item in the active table.
    pub async fn put_item(&self, key: &str, value: impl Into<StoredValue>) -> Result<(), SaveError> {
        let table = self.active.get().ok_or(SaveError::NoTableSelected)?;
        let schema = self.schema.read().await;
        schema.table(&table)?.put(key, value).await?;
        Ok(())
    }

    pub async fn get_item(&self, key: &str) -> Result<Option<StoredValue>, SaveError> {
        let table = self.active.get().ok_or(SaveError::NoTableSelected)?;
        let schema = self.schema.read().await;
        Ok(schema.table(&table)?.get(key).await?)
    }

    /// Removes an item from the active table. Returns whether it existed.
    pub async fn delete_item(&self, key: &str) -> Result<bool, SaveError> {
        let table = self.active.get().ok_or(SaveError::NoTableSelected)?;
        let schema = self.schema.read().await;
        Ok(schema.table(&table)?.delete(key).await?)
    }

    /// Runs one save.
    ///
    /// Fails before any download with [`SaveError::ZoomTooLow`] when the
    /// zoom derived from the view is below the floor. Per-tile download
    /// and persist failures do not fail the save; they show up as
    /// `saved < total` and in `failed_keys`. A failure to create or clear
    /// the target table cancels the remaining tiles and is returned once
    /// in-flight tiles settle.
    pub async fn save(&self, request: SaveRequest) -> Result<SaveReport, SaveError> {
        let _guard = SaveGuard::acquire(&self.in_progress).ok_or(SaveError::SaveInProgress)?;
        let config = self.config();

        let zoom_levels = self.resolve_zoom_levels(&request, &config)?;
        let bounds = request
            .bounds
            .or(config.bounds)
            .unwrap_or_else(|| self.view.bounds());

        let mut tiles: Vec<TileDescriptor> = Vec::new();
        for &zoom in &zoom_levels {
            tiles.extend(self.source.enumerate_tiles(&bounds, zoom)?);
        }
        let tiles: Arc<[TileDescriptor]> = tiles.into();

        self.status
            .lock()
            .reset(request.table.clone(), Arc::clone(&tiles), zoom_levels.iter().min().copied());

        let gate = self.save_gate.read().clone();
        let table = match gate {
            Some(gate) => {
                let snapshot = self.status();
                match gate.confirm(&snapshot).await {
                    GateDecision::Proceed => request.table.clone(),
                    GateDecision::ProceedInto(table) => Some(table),
                    GateDecision::Decline => {
                        info!(tiles = tiles.len(), "Save declined");
                        return Ok(self.finish(SaveOutcome::Declined, 0));
                    }
                }
            }
            None => request.table.clone(),
        };
        let table = table.ok_or(SaveError::NoTableSelected)?;

        let snapshot = {
            let mut status = self.status.lock();
            status.target_table = Some(table.clone());
            status.clone()
        };
        info!(
            table = %table,
            tiles = tiles.len(),
            zoom_levels = ?zoom_levels,
            "Save started"
        );
        self.events.publish(SaveEvent::SaveStarted(snapshot));

        if tiles.is_empty() {
            let snapshot = self.status();
            self.events.publish(SaveEvent::LoadEnded(snapshot));
            return Ok(self.finish(SaveOutcome::Completed, 0));
        }

        let cancel = request.cancel.unwrap_or_default();
        let abort = cancel.child_token();
        let concurrency = config
            .concurrency
            .filter(|&n| n > 0)
            .unwrap_or_else(|| self.source.max_simultaneous());
        let limiter = ConcurrencyLimiter::new(concurrency);
        let materializer = TableMaterializer::new();

        // Sliding window: twice the fetch limit so persists overlap fetches.
        let mut queue = tiles.iter();
        let mut pending = FuturesUnordered::new();
        for tile in queue.by_ref().take(concurrency * 2) {
            pending.push(self.process_tile(tile, &table, &limiter, &materializer, &abort));
        }

        while let Some(outcome) = pending.next().await {
            if outcome == TileOutcome::Cancelled || abort.is_cancelled() {
                continue;
            }
            if let Some(tile) = queue.next() {
                pending.push(self.process_tile(tile, &table, &limiter, &materializer, &abort));
            }
        }

        if let Some(e) = materializer.take_error() {
            warn!(table = %table, error = %e, "Save aborted: target table unavailable");
            self.finish(SaveOutcome::Cancelled, limiter.peak_in_flight());
            return Err(SaveError::Schema(e));
        }

        let status = self.status();
        if materializer.is_ready() && status.saved != status.total {
            if let Err(e) = self.refresh_storage_size().await {
                warn!(error = %e, "Failed to refresh storage size");
            }
        }

        let outcome = if cancel.is_cancelled() {
            SaveOutcome::Cancelled
        } else {
            SaveOutcome::Completed
        };
        let report = self.finish(outcome, limiter.peak_in_flight());
        info!(
            table = %table,
            total = report.status.total,
            saved = report.status.saved,
            failed = report.status.failed,
            bytes = report.status.bytes,
            outcome = ?outcome,
            "Save finished"
        );
        Ok(report)
    }

    fn resolve_zoom_levels(
        &self,
        request: &SaveRequest,
        config: &SaveConfig,
    ) -> Result<Vec<u8>, SaveError> {
        let minimal = config.minimal_zoom;

        if let Some(levels) = request.zoom_levels.as_ref().or(config.zoom_levels.as_ref()) {
            let kept: Vec<u8> = levels.iter().copied().filter(|&z| z >= minimal).collect();
            if kept.len() < levels.len() {
                debug!(
                    requested = ?levels,
                    kept = ?kept,
                    minimal,
                    "Skipping zoom levels below the minimum"
                );
            }
            return Ok(kept);
        }

        let current = self.view.zoom();
        if current < minimal {
            return Err(SaveError::ZoomTooLow {
                zoom: current,
                minimal,
            });
        }

        let max_zoom = self
            .source
            .max_zoom()
            .or_else(|| self.view.max_zoom())
            .or(config.max_zoom)
            .unwrap_or(current)
            .max(current);

        Ok((current..=max_zoom).collect())
    }

    async fn process_tile(
        &self,
        tile: &TileDescriptor,
        table: &str,
        limiter: &ConcurrencyLimiter,
        materializer: &TableMaterializer,
        abort: &CancellationToken,
    ) -> TileOutcome {
        if abort.is_cancelled() {
            return TileOutcome::Cancelled;
        }

        let fetched = {
            let _permit = tokio::select! {
                biased;
                _ = abort.cancelled() => return TileOutcome::Cancelled,
                permit = limiter.acquire() => permit,
            };

            tokio::select! {
                biased;
                _ = abort.cancelled() => return TileOutcome::Cancelled,
                result = self.client.get(&tile.url) => result,
            }
        };

        let data = match fetched {
            Ok(data) => {
                self.record_loaded(data.len());
                data
            }
            Err(e) => {
                warn!(url = %tile.url, key = %tile.key, error = %e, "Tile download failed");
                self.record_failed(&tile.key, true);
                return TileOutcome::Failed;
            }
        };

        if !materializer.ensure(|| self.materialize(table)).await {
            abort.cancel();
            return TileOutcome::Cancelled;
        }
        if abort.is_cancelled() {
            return TileOutcome::Cancelled;
        }

        match self.persist(table, &tile.key, data).await {
            Ok(()) => {
                self.record_saved().await;
                TileOutcome::Saved
            }
            Err(e) => {
                warn!(key = %tile.key, table, error = %e, "Failed to persist tile");
                self.record_failed(&tile.key, false);
                TileOutcome::Failed
            }
        }
    }

    /// Creates the target table, or clears it if it already exists.
    async fn materialize(&self, table: &str) -> Result<(), SchemaError> {
        let (tables, created) = {
            let mut schema = self.schema.write().await;
            let created = if schema.contains(table) {
                schema.table(table)?.clear().await?;
                info!(table, "Cleared existing table for save");
                false
            } else {
                schema.add_table(table).await?;
                info!(table, version = schema.version(), "Created table for save");
                true
            };
            (schema.tables().to_vec(), created)
        };

        self.status.lock().tables = tables.clone();
        self.active.set(table);
        if created {
            self.events.publish(SaveEvent::TableListChanged {
                tables,
                changed: Some(table.to_string()),
            });
        }
        Ok(())
    }

    async fn persist(&self, table: &str, key: &str, data: Bytes) -> Result<(), SchemaError> {
        let schema = self.schema.read().await;
        schema.table(table)?.put(key, data).await?;
        Ok(())
    }

    fn record_loaded(&self, bytes: usize) {
        let load_ended = {
            let mut status = self.status.lock();
            status.loaded += 1;
            status.bytes += bytes as u64;
            status.is_loaded().then(|| status.clone())
        };
        if let Some(snapshot) = load_ended {
            self.publish_load_ended(snapshot);
        }
    }

    /// Records a failed tile. `loaded` is true when the failure was the
    /// fetch itself, which still completes one load attempt.
    fn record_failed(&self, key: &str, loaded: bool) {
        let load_ended = {
            let mut status = self.status.lock();
            status.failed += 1;
            status.failed_keys.push(key.to_string());
            if loaded {
                status.loaded += 1;
                status.is_loaded().then(|| status.clone())
            } else {
                None
            }
        };
        if let Some(snapshot) = load_ended {
            self.publish_load_ended(snapshot);
        }
    }

    fn publish_load_ended(&self, snapshot: SaveStatus) {
        info!(
            loaded = snapshot.loaded,
            failed = snapshot.failed,
            bytes = snapshot.bytes,
            "All tiles loaded"
        );
        self.events.publish(SaveEvent::LoadEnded(snapshot));
    }

    async fn record_saved(&self) {
        let (snapshot, finalized) = {
            let mut status = self.status.lock();
            status.saved += 1;
            (status.clone(), status.saved == status.total)
        };

        self.events.publish(SaveEvent::TileSaved(snapshot.clone()));

        if finalized {
            info!(table = ?snapshot.target_table, saved = snapshot.saved, "Table finalized");
            self.events.publish(SaveEvent::TableFinalized(snapshot));
            if let Err(e) = self.refresh_storage_size().await {
                warn!(error = %e, "Failed to refresh storage size");
            }
        }
    }

    fn finish(&self, outcome: SaveOutcome, peak_concurrency: usize) -> SaveReport {
        let status = {
            let mut status = self.status.lock();
            status.is_complete = true;
            status.was_cancelled = outcome == SaveOutcome::Cancelled;
            status.clone()
        };
        SaveReport {
            outcome,
            status,
            peak_concurrency,
        }
    }
}
