//! Versioned key-value store
//!
//! Tiles and generic items live in named tables of a store. The set of
//! tables is governed by numbered schema versions: callers declare the
//! schema per version while the store is closed, and opening the store
//! applies the declarations.
//!
//! # Engines
//!
//! - [`MemoryStore`] - process-local, used by tests and ephemeral caches
//! - [`DiskStore`] - one directory per store, one file per value
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tilevault::store::{MemoryStore, SchemaFragment, StoreEngine, Table};
//!
//! # tokio_test_block_on(async {
//! let store = Arc::new(MemoryStore::new("tiles"));
//! store.declare_version(1, SchemaFragment::new().declare("osm", "")).unwrap();
//! store.open().await.unwrap();
//!
//! let table = Table::open(store.clone(), "osm").unwrap();
//! table.put("tile-key", vec![0x89, 0x50, 0x4e, 0x47]).await.unwrap();
//! assert_eq!(table.count().await.unwrap(), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod disk;
mod engine;
mod history;
mod memory;
mod table;
mod types;

use std::future::Future;
use std::pin::Pin;

pub use disk::DiskStore;
pub use engine::StoreEngine;
pub use history::{SchemaPlan, VersionHistory};
pub use memory::MemoryStore;
pub use table::Table;
pub use types::{OpenOutcome, Schema, SchemaFragment, StoreError, StoredValue, TableDef};

/// Boxed future returned by object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
