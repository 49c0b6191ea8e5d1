//! Table creation and removal through schema version bumps.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::SchemaError;
use crate::store::{OpenOutcome, SchemaFragment, StoreEngine, StoreError, Table};

/// Version assumed for a store that does not exist yet.
pub const INITIAL_VERSION: u32 = 1;

/// Owns the ordered list of known tables and the committed schema version.
///
/// Every add or drop is one migration that changes exactly one table:
///
/// 1. close the store
/// 2. re-declare the current version with every known table
/// 3. declare `version + 1` with only the delta
/// 4. reopen
///
/// Reopening invalidates table handles obtained before the migration, so
/// callers must finish awaiting the migration and then request a fresh
/// [`Table`] via [`SchemaManager::table`].
pub struct SchemaManager {
    engine: Arc<dyn StoreEngine>,
    tables: Vec<String>,
    version: u32,
}

impl SchemaManager {
    pub fn new(engine: Arc<dyn StoreEngine>) -> Self {
        Self {
            engine,
            tables: Vec::new(),
            version: INITIAL_VERSION,
        }
    }

    pub fn engine(&self) -> &Arc<dyn StoreEngine> {
        &self.engine
    }

    /// Known tables in declaration order.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t == table)
    }

    /// Last committed schema version.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Opens the store and loads the committed schema.
    ///
    /// A store that does not exist yet is not an error: it yields an empty
    /// table list at version 1.
    pub async fn open(&mut self) -> Result<&[String], SchemaError> {
        match self.engine.open().await {
            Ok(OpenOutcome::Found { version, tables }) => {
                debug!(store = %self.engine.name(), version, tables = ?tables, "Store schema loaded");
                self.version = version;
                self.tables = tables;
            }
            Ok(OpenOutcome::Absent) => {
                debug!(store = %self.engine.name(), "Store not found, starting empty");
                self.version = INITIAL_VERSION;
                self.tables.clear();
            }
            Err(e) => return Err(SchemaError::StoreUnavailable(e)),
        }
        Ok(&self.tables)
    }

    /// Creates `table` in a new schema version.
    pub async fn add_table(&mut self, table: &str) -> Result<(), SchemaError> {
        if table.is_empty() {
            return Err(SchemaError::InvalidTableName(table.to_string()));
        }
        if self.contains(table) {
            return Err(SchemaError::TableExists(table.to_string()));
        }
        self.migrate(table, SchemaFragment::new().declare(table, ""))
            .await
    }

    /// Drops `table` and its rows in a new schema version.
    ///
    /// Unknown names are rejected without bumping the version.
    pub async fn drop_table(&mut self, table: &str) -> Result<(), SchemaError> {
        if !self.contains(table) {
            return Err(SchemaError::UnknownTable(table.to_string()));
        }
        self.migrate(table, SchemaFragment::new().drop_table(table))
            .await
    }

    /// Returns a handle to `table` bound to the current store session.
    pub fn table(&self, table: &str) -> Result<Table, SchemaError> {
        if !self.contains(table) {
            return Err(SchemaError::UnknownTable(table.to_string()));
        }
        Ok(Table::open(Arc::clone(&self.engine), table)?)
    }

    async fn migrate(&mut self, table: &str, delta: SchemaFragment) -> Result<(), SchemaError> {
        let next = self.version + 1;
        self.engine.close().await;

        match self.declare_and_reopen(next, delta).await {
            Ok(OpenOutcome::Found { version, tables }) => {
                info!(
                    store = %self.engine.name(),
                    table = %table,
                    version,
                    tables = ?tables,
                    "Store schema migrated"
                );
                self.version = version;
                self.tables = tables;
                Ok(())
            }
            Ok(OpenOutcome::Absent) => Err(SchemaError::Migration {
                table: table.to_string(),
                version: next,
                source: StoreError::Manifest("store reported absent after declaring versions".into()),
            }),
            Err(source) => {
                warn!(
                    store = %self.engine.name(),
                    table = %table,
                    version = next,
                    error = %source,
                    "Store schema migration failed"
                );
                Err(SchemaError::Migration {
                    table: table.to_string(),
                    version: next,
                    source,
                })
            }
        }
    }

    async fn declare_and_reopen(
        &self,
        next: u32,
        delta: SchemaFragment,
    ) -> Result<OpenOutcome, StoreError> {
        let current = SchemaFragment::from_tables(self.tables.iter().cloned());
        self.engine.declare_version(self.version, current)?;
        self.engine.declare_version(next, delta)?;
        self.engine.open().await
    }
}

impl std::fmt::Debug for SchemaManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaManager")
            .field("store", &self.engine.name())
            .field("tables", &self.tables)
            .field("version", &self.version)
            .finish()
    }
}
