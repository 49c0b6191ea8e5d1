//! On-disk store engine.
//!
//! # File Layout
//!
//! ```text
//! {root}/{store}/manifest.json          committed version and table list
//! {root}/{store}/{table_hash}/          one directory per table
//! {root}/{store}/{table_hash}/{key_hash}.blob   binary values
//! {root}/{store}/{table_hash}/{key_hash}.json   generic items
//! ```
//!
//! Table names and keys are hashed with SHA-256 so that arbitrary strings
//! (tile URLs included) map to safe file names. Values and the manifest are
//! written to a temporary file and renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::engine::StoreEngine;
use super::history::VersionHistory;
use super::types::{OpenOutcome, Schema, SchemaFragment, StoreError, StoredValue};
use super::BoxFuture;

const MANIFEST_FILE: &str = "manifest.json";
const BLOB_EXTENSION: &str = "blob";
const ITEM_EXTENSION: &str = "json";

#[derive(Default)]
struct DiskState {
    history: VersionHistory,
    schema: Option<Schema>,
    session: Option<u64>,
}

/// Store engine persisting tables as directories of files.
pub struct DiskStore {
    name: String,
    directory: PathBuf,
    state: Mutex<DiskState>,
    next_session: AtomicU64,
    next_temp: AtomicU64,
}

impl DiskStore {
    /// Creates an engine for store `name` under `root`.
    ///
    /// Nothing is touched on disk until the store is opened with at least
    /// one declared version.
    pub fn new(root: impl AsRef<Path>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            directory: root.as_ref().join(&name),
            name,
            state: Mutex::new(DiskState::default()),
            next_session: AtomicU64::new(1),
            next_temp: AtomicU64::new(0),
        }
    }

    /// Directory holding this store's manifest and tables.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn hash_hex(value: &str) -> String {
        format!("{:x}", Sha256::digest(value.as_bytes()))
    }

    fn table_dir(&self, table: &str) -> PathBuf {
        self.directory.join(&Self::hash_hex(table)[..32])
    }

    fn value_path(&self, table: &str, key: &str, extension: &str) -> PathBuf {
        self.table_dir(table)
            .join(format!("{}.{}", Self::hash_hex(key), extension))
    }

    /// Resolves the directory of a table of the open store.
    fn checked_table_dir(&self, table: &str) -> Result<PathBuf, StoreError> {
        let state = self.state.lock();
        if state.session.is_none() {
            return Err(StoreError::Closed(self.name.clone()));
        }
        match state.schema.as_ref() {
            Some(schema) if schema.contains(table) => Ok(self.table_dir(table)),
            _ => Err(StoreError::NoSuchTable(table.to_string())),
        }
    }

    async fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let n = self.next_temp.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("tmp{}", n));
        tokio::fs::write(&temp_path, contents).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }

    async fn read_manifest(&self) -> Result<Option<Schema>, StoreError> {
        match tokio::fs::read(self.directory.join(MANIFEST_FILE)).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(Some)
                .map_err(|e| StoreError::Manifest(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn remove_if_exists(path: &Path) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn open_async(&self) -> Result<OpenOutcome, StoreError> {
        let history = {
            let state = self.state.lock();
            if state.session.is_some() {
                return Ok(state
                    .schema
                    .as_ref()
                    .map(OpenOutcome::from)
                    .unwrap_or(OpenOutcome::Absent));
            }
            state.history.clone()
        };

        let persisted = self.read_manifest().await?;

        let schema = match history.plan(persisted.as_ref())? {
            Some(plan) => {
                tokio::fs::create_dir_all(&self.directory).await?;
                for table in &plan.dropped {
                    match tokio::fs::remove_dir_all(self.table_dir(table)).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == ErrorKind::NotFound => {}
                        Err(e) => return Err(StoreError::Io(e)),
                    }
                }
                for table in &plan.created {
                    tokio::fs::create_dir_all(self.table_dir(table)).await?;
                }

                let manifest = serde_json::to_vec_pretty(&plan.target)
                    .map_err(|e| StoreError::Manifest(e.to_string()))?;
                self.write_atomic(&self.directory.join(MANIFEST_FILE), &manifest)
                    .await?;

                if !plan.is_noop() {
                    info!(
                        store = %self.name,
                        version = plan.target.version,
                        created = ?plan.created,
                        dropped = ?plan.dropped,
                        "Store schema upgraded"
                    );
                }
                Some(plan.target)
            }
            None => persisted,
        };

        let mut state = self.state.lock();
        let Some(schema) = schema else {
            return Ok(OpenOutcome::Absent);
        };
        let outcome = OpenOutcome::from(&schema);
        state.history.clear();
        state.schema = Some(schema);
        state.session = Some(self.next_session.fetch_add(1, Ordering::SeqCst));
        debug!(store = %self.name, session = ?state.session, "Store opened");
        Ok(outcome)
    }

    async fn get_async(&self, table: &str, key: &str) -> Result<Option<StoredValue>, StoreError> {
        self.checked_table_dir(table)?;

        match tokio::fs::read(self.value_path(table, key, BLOB_EXTENSION)).await {
            Ok(data) => return Ok(Some(StoredValue::Blob(Bytes::from(data)))),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }

        match tokio::fs::read(self.value_path(table, key, ITEM_EXTENSION)).await {
            Ok(data) => serde_json::from_slice(&data)
                .map(|value| Some(StoredValue::Item(value)))
                .map_err(|e| StoreError::Value(e.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn put_async(&self, table: &str, key: &str, value: StoredValue) -> Result<(), StoreError> {
        self.checked_table_dir(table)?;

        let (extension, stale_extension, contents) = match value {
            StoredValue::Blob(bytes) => (BLOB_EXTENSION, ITEM_EXTENSION, bytes.to_vec()),
            StoredValue::Item(value) => (
                ITEM_EXTENSION,
                BLOB_EXTENSION,
                serde_json::to_vec(&value).map_err(|e| StoreError::Value(e.to_string()))?,
            ),
        };

        self.write_atomic(&self.value_path(table, key, extension), &contents)
            .await?;
        Self::remove_if_exists(&self.value_path(table, key, stale_extension)).await?;
        Ok(())
    }

    async fn delete_async(&self, table: &str, key: &str) -> Result<bool, StoreError> {
        self.checked_table_dir(table)?;

        let blob = Self::remove_if_exists(&self.value_path(table, key, BLOB_EXTENSION)).await?;
        let item = Self::remove_if_exists(&self.value_path(table, key, ITEM_EXTENSION)).await?;
        Ok(blob || item)
    }

    async fn clear_async(&self, table: &str) -> Result<(), StoreError> {
        let dir = self.checked_table_dir(table)?;

        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }
        tokio::fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn count_async(&self, table: &str) -> Result<u64, StoreError> {
        let dir = self.checked_table_dir(table)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StoreError::Io(e)),
        };

        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_value = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == BLOB_EXTENSION || ext == ITEM_EXTENSION);
            if is_value {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl StoreEngine for DiskStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> BoxFuture<'_, Result<OpenOutcome, StoreError>> {
        Box::pin(self.open_async())
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if self.state.lock().session.take().is_some() {
                debug!(store = %self.name, "Store closed");
            }
        })
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
        state.session.is_some() && state.schema.as_ref().is_some_and(|s| s.contains(table))
    }

    fn get<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredValue>, StoreError>> {
        Box::pin(self.get_async(table, key))
    }

    fn put<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
        value: StoredValue,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.put_async(table, key, value))
    }

    fn delete<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        Box::pin(self.delete_async(table, key))
    }

    fn clear<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.clear_async(table))
    }

    fn count<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<u64, StoreError>> {
        Box::pin(self.count_async(table))
    }
}
