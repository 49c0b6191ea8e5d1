//! In-memory store engine.
//!
//! Rows and the committed schema survive close/reopen for the lifetime of
//! the `MemoryStore` value, which makes it a faithful stand-in for the disk
//! engine in tests.

use std::collections::{BTreeMap, HashMap};
use std::future::ready;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::engine::StoreEngine;
use super::history::VersionHistory;
use super::types::{OpenOutcome, Schema, SchemaFragment, StoreError, StoredValue};
use super::BoxFuture;

#[derive(Default)]
struct MemoryState {
    history: VersionHistory,
    schema: Option<Schema>,
    rows: HashMap<String, BTreeMap<String, StoredValue>>,
    session: Option<u64>,
}

/// Process-local store engine.
pub struct MemoryStore {
    name: String,
    state: Mutex<MemoryState>,
    next_session: AtomicU64,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryState::default()),
            next_session: AtomicU64::new(1),
        }
    }

    fn open_sync(&self) -> Result<OpenOutcome, StoreError> {
        let mut state = self.state.lock();

        if state.session.is_some() {
            return Ok(state
                .schema
                .as_ref()
                .map(OpenOutcome::from)
                .unwrap_or(OpenOutcome::Absent));
        }

        if let Some(plan) = state.history.plan(state.schema.as_ref())? {
            for table in &plan.dropped {
                state.rows.remove(table);
            }
            for table in &plan.created {
                state.rows.insert(table.clone(), BTreeMap::new());
            }
            debug!(
                store = %self.name,
                version = plan.target.version,
                created = ?plan.created,
                dropped = ?plan.dropped,
                "Applied declared schema"
            );
            state.schema = Some(plan.target);
            state.history.clear();
        }

        let Some(schema) = state.schema.as_ref() else {
            return Ok(OpenOutcome::Absent);
        };
        let outcome = OpenOutcome::from(schema);

        state.session = Some(self.next_session.fetch_add(1, Ordering::SeqCst));
        Ok(outcome)
    }

    /// Runs `f` against the rows of an existing table of the open store.
    fn with_rows<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut BTreeMap<String, StoredValue>) -> T,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock();
        if state.session.is_none() {
            return Err(StoreError::Closed(self.name.clone()));
        }
        state
            .rows
            .get_mut(table)
            .map(f)
            .ok_or_else(|| StoreError::NoSuchTable(table.to_string()))
    }
}

impl StoreEngine for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> BoxFuture<'_, Result<OpenOutcome, StoreError>> {
        Box::pin(ready(self.open_sync()))
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.state.lock().session = None;
        Box::pin(ready(()))
    }

    fn is_open(&self) -> bool {
        self.state.lock().session.is_some()
    }

    fn session(&self) -> Option<u64> {
        self.state.lock().session
    }

    fn declare_version(&self, version: u32, fragment: SchemaFragment) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.session.is_some() {
            return Err(StoreError::DeclareWhileOpen(self.name.clone()));
        }
        state.history.declare(version, fragment)
    }

    fn has_table(&self, table: &str) -> bool {
        let state = self.state.lock();
        state.session.is_some() && state.rows.contains_key(table)
    }

    fn get<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredValue>, StoreError>> {
        Box::pin(ready(self.with_rows(table, |rows| rows.get(key).cloned())))
    }

    fn put<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
        value: StoredValue,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(ready(self.with_rows(table, |rows| {
            rows.insert(key.to_string(), value);
        })))
    }

    fn delete<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(ready(
            self.with_rows(table, |rows| rows.remove(key).is_some()),
        ))
    }

    fn clear<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(ready(self.with_rows(table, |rows| rows.clear())))
    }

    fn count<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<u64, StoreError>> {
        Box::pin(ready(self.with_rows(table, |rows| rows.len() as u64)))
    }
}
