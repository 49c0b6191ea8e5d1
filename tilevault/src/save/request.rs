//! Save options, requests and reports.

use tokio_util::sync::CancellationToken;

use super::events::DEFAULT_EVENT_CAPACITY;
use super::status::SaveStatus;
use crate::coord::LatLngBounds;

/// Lowest zoom a derived save may start from.
pub const DEFAULT_MINIMAL_ZOOM: u8 = 8;

/// Highest zoom a derived save reaches when neither layer nor map set one.
pub const DEFAULT_MAX_ZOOM: u8 = 19;

/// Long-lived options of a [`SavePipeline`](super::SavePipeline).
#[derive(Debug, Clone, PartialEq)]
pub struct SaveConfig {
    /// Floor for saves; derived saves below it are rejected and explicit
    /// zoom levels below it are skipped.
    pub minimal_zoom: u8,
    /// Control-level maximum zoom, consulted after the layer's and the
    /// map's.
    pub max_zoom: Option<u8>,
    /// Explicit zoom levels; take priority over the derived range.
    pub zoom_levels: Option<Vec<u8>>,
    /// Area to save; defaults to the view's bounds.
    pub bounds: Option<LatLngBounds>,
    /// Maximum simultaneous fetches; `None` or 0 means one per subdomain.
    pub concurrency: Option<usize>,
    pub event_capacity: usize,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            minimal_zoom: DEFAULT_MINIMAL_ZOOM,
            max_zoom: Some(DEFAULT_MAX_ZOOM),
            zoom_levels: None,
            bounds: None,
            concurrency: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Parameters of one save.
///
/// Fields left unset fall back to the pipeline's [`SaveConfig`] and then
/// to the map view.
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    /// Target table; a save gate may override it.
    pub table: Option<String>,
    pub zoom_levels: Option<Vec<u8>>,
    pub bounds: Option<LatLngBounds>,
    /// Cancels the save at the next fetch or persist.
    pub cancel: Option<CancellationToken>,
}

impl SaveRequest {
    pub fn into_table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::default()
        }
    }

    pub fn with_zoom_levels(mut self, zoom_levels: Vec<u8>) -> Self {
        self.zoom_levels = Some(zoom_levels);
        self
    }

    pub fn with_bounds(mut self, bounds: LatLngBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Every tile was attempted.
    Completed,
    /// The save gate declined; nothing was downloaded.
    Declined,
    /// The caller cancelled the save part way.
    Cancelled,
}

/// Summary of a finished save.
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub outcome: SaveOutcome,
    /// Final status snapshot.
    pub status: SaveStatus,
    /// Highest number of simultaneous fetches observed.
    pub peak_concurrency: usize,
}

impl SaveReport {
    pub fn saved(&self) -> usize {
        self.status.saved
    }

    pub fn total(&self) -> usize {
        self.status.total
    }

    pub fn failed_keys(&self) -> &[String] {
        &self.status.failed_keys
    }

    /// True if every tile was saved.
    pub fn is_complete_success(&self) -> bool {
        self.outcome == SaveOutcome::Completed && self.status.saved == self.status.total
    }
}
