//! Save pipeline errors.

use thiserror::Error;

use crate::schema::SchemaError;
use crate::source::SourceError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SaveError {
    /// Raised before any download when the zoom derived from the view is
    /// below the configured floor.
    #[error("not allowed to save with zoom level {zoom} below {minimal}")]
    ZoomTooLow { zoom: u8, minimal: u8 },

    #[error("a save is already in progress")]
    SaveInProgress,

    #[error("no table selected")]
    NoTableSelected,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
