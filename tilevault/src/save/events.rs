//! Save notifications.
//!
//! The pipeline publishes [`SaveEvent`]s on a broadcast channel. Front
//! ends subscribe to render progress; nothing in the pipeline depends on
//! anyone listening.

use tokio::sync::broadcast;
use tracing::trace;

use super::status::SaveStatus;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub enum SaveEvent {
    /// The set of tables changed. `changed` names the table a save created
    /// or that was dropped, and is `None` when the list was (re)loaded.
    TableListChanged {
        tables: Vec<String>,
        changed: Option<String>,
    },
    /// The save was confirmed and downloads are starting.
    SaveStarted(SaveStatus),
    /// One tile was persisted.
    TileSaved(SaveStatus),
    /// Every tile of the save was persisted.
    TableFinalized(SaveStatus),
    /// Every fetch attempt finished. Published exactly once per save.
    LoadEnded(SaveStatus),
    /// The row count of the active table was refreshed.
    StorageSizeChanged(SaveStatus),
}

impl SaveEvent {
    /// Short event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SaveEvent::TableListChanged { .. } => "table_list_changed",
            SaveEvent::SaveStarted(_) => "save_started",
            SaveEvent::TileSaved(_) => "tile_saved",
            SaveEvent::TableFinalized(_) => "table_finalized",
            SaveEvent::LoadEnded(_) => "load_ended",
            SaveEvent::StorageSizeChanged(_) => "storage_size_changed",
        }
    }
}

/// Broadcast channel for save events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SaveEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaveEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: SaveEvent) {
        let name = event.name();
        if self.sender.send(event).is_err() {
            trace!(event = name, "No subscribers for save event");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
