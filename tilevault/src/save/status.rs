//! Save progress state.

use std::sync::Arc;

use crate::source::TileDescriptor;

/// Progress and aggregates of the current (or last) save operation.
///
/// Owned by the pipeline and shared with observers as snapshots. Counters
/// satisfy `saved + failed <= loaded <= total` at all times; `loaded`
/// counts fetch attempts that finished, successful or not.
#[derive(Debug, Clone)]
pub struct SaveStatus {
    /// Known tables, in schema order.
    pub tables: Vec<String>,
    /// Table the save writes into, once chosen.
    pub target_table: Option<String>,
    /// Every tile of the save, in processing order.
    pub pending: Arc<[TileDescriptor]>,
    pub total: usize,
    /// Tiles persisted.
    pub saved: usize,
    /// Fetch attempts finished, successful or not.
    pub loaded: usize,
    /// Tiles that could not be fetched or persisted.
    pub failed: usize,
    /// Bytes downloaded.
    pub bytes: u64,
    /// Lowest zoom level of the save.
    pub min_zoom: Option<u8>,
    /// Row count of the active table, when known.
    pub storage_size: Option<u64>,
    /// Storage keys of failed tiles, for retrying.
    pub failed_keys: Vec<String>,
    pub is_complete: bool,
    pub was_cancelled: bool,
}

impl SaveStatus {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            target_table: None,
            pending: Arc::from(Vec::new()),
            total: 0,
            saved: 0,
            loaded: 0,
            failed: 0,
            bytes: 0,
            min_zoom: None,
            storage_size: None,
            failed_keys: Vec::new(),
            is_complete: false,
            was_cancelled: false,
        }
    }

    /// Resets progress for a new save over `tiles`.
    ///
    /// The table list and storage size carry over.
    pub fn reset(&mut self, target_table: Option<String>, tiles: Arc<[TileDescriptor]>, min_zoom: Option<u8>) {
        self.target_table = target_table;
        self.total = tiles.len();
        self.pending = tiles;
        self.saved = 0;
        self.loaded = 0;
        self.failed = 0;
        self.bytes = 0;
        self.min_zoom = min_zoom;
        self.failed_keys.clear();
        self.is_complete = false;
        self.was_cancelled = false;
    }

    /// Fetches still outstanding.
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.loaded)
    }

    /// Fraction of tiles persisted, from 0.0 to 1.0.
    pub fn progress_fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.saved as f64 / self.total as f64
    }

    /// True once every fetch attempt has been accounted for.
    pub fn is_loaded(&self) -> bool {
        self.loaded == self.total
    }
}

impl Default for SaveStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;

    fn tiles(n: u32) -> Arc<[TileDescriptor]> {
        (0..n)
            .map(|x| TileDescriptor {
                key: format!("k{}", x),
                url: format!("u{}", x),
                coord: TileCoord::new(x, 0, 10),
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_reset_clears_progress_but_keeps_tables() {
        let mut status = SaveStatus::new();
        status.tables = vec!["osm".to_string()];
        status.storage_size = Some(12);
        status.saved = 3;
        status.loaded = 4;
        status.failed_keys.push("k".to_string());
        status.is_complete = true;

        status.reset(Some("new".to_string()), tiles(5), Some(10));

        assert_eq!(status.total, 5);
        assert_eq!(status.pending.len(), 5);
        assert_eq!((status.saved, status.loaded, status.failed), (0, 0, 0));
        assert!(status.failed_keys.is_empty());
        assert!(!status.is_complete);
        assert_eq!(status.tables, vec!["osm".to_string()]);
        assert_eq!(status.storage_size, Some(12));
        assert_eq!(status.target_table.as_deref(), Some("new"));
    }

    #[test]
    fn test_progress_fraction() {
        let mut status = SaveStatus::new();
        assert_eq!(status.progress_fraction(), 1.0, "Empty save is complete");

        status.reset(None, tiles(4), None);
        status.saved = 1;
        assert!((status.progress_fraction() - 0.25).abs() < f64::EPSILON);
        status.loaded = 3;
        assert_eq!(status.remaining(), 1);
        assert!(!status.is_loaded());
    }
}
