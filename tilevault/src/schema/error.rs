//! Schema management errors.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// The store could not be opened.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// A version bump failed. The store may be left on an intermediate
    /// version; the manager keeps the last committed table list.
    #[error("migration of table '{table}' to version {version} failed: {source}")]
    Migration {
        table: String,
        version: u32,
        #[source]
        source: StoreError,
    },

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
