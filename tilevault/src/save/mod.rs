//! Region saving
//!
//! [`SavePipeline`] downloads every tile of a bounding box across a set of
//! zoom levels and stores the bytes in a table of the store, keyed by the
//! normalized tile URL.
//!
//! # Architecture
//!
//! ```text
//! SaveRequest ──► zoom levels + bounds ──► TileSource::enumerate_tiles
//!                                                  │
//!                                            SaveGate::confirm
//!                                                  │
//!                     ┌────────────────────────────┴──────────────┐
//!                     ▼                                           ▼
//!          ConcurrencyLimiter ──► AsyncHttpClient::get    SaveStatus / EventBus
//!                     │
//!          TableMaterializer (first success creates or clears the table)
//!                     │
//!                Table::put
//! ```
//!
//! Per-tile failures are counted, never fatal. Observers follow progress
//! through [`SaveEvent`]s or by polling [`SavePipeline::status`].

mod error;
mod events;
mod gate;
mod limiter;
mod materialize;
mod pipeline;
mod request;
mod status;

pub use error::SaveError;
pub use events::{EventBus, SaveEvent, DEFAULT_EVENT_CAPACITY};
pub use gate::{FixedGate, GateDecision, RemovalGate, SaveGate};
pub use limiter::{ConcurrencyLimiter, ConcurrencyPermit};
pub use materialize::TableMaterializer;
pub use pipeline::SavePipeline;
pub use request::{
    SaveConfig, SaveOutcome, SaveReport, SaveRequest, DEFAULT_MAX_ZOOM, DEFAULT_MINIMAL_ZOOM,
};
pub use status::SaveStatus;

#[cfg(test)]
mod tests;
