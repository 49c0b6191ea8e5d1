//! Tests for schema migrations

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::*;
use crate::store::{
    BoxFuture, MemoryStore, OpenOutcome, SchemaFragment, StoreEngine, StoreError, StoredValue,
};

fn memory_manager() -> (Arc<MemoryStore>, SchemaManager) {
    let store = Arc::new(MemoryStore::new("tile-maps"));
    let manager = SchemaManager::new(store.clone());
    (store, manager)
}

#[tokio::test]
async fn test_open_absent_store_is_empty_at_version_one() {
    let (_store, mut manager) = memory_manager();

    let tables = manager.open().await.unwrap();
    assert!(tables.is_empty());
    assert_eq!(manager.version(), INITIAL_VERSION);
}

#[tokio::test]
async fn test_add_table_bumps_version() {
    let (store, mut manager) = memory_manager();
    manager.open().await.unwrap();

    manager.add_table("osm").await.unwrap();

    assert_eq!(manager.tables(), &["osm".to_string()]);
    assert_eq!(manager.version(), 2);
    assert!(store.is_open(), "Store must be reopened after the migration");
    assert!(store.has_table("osm"));
}

#[tokio::test]
async fn test_migration_preserves_other_tables() {
    let (_store, mut manager) = memory_manager();
    manager.open().await.unwrap();
    manager.add_table("A").await.unwrap();

    let a = manager.table("A").unwrap();
    a.put("k1", vec![1u8]).await.unwrap();
    a.put("k2", vec![2u8]).await.unwrap();

    manager.add_table("B").await.unwrap();
    assert_eq!(manager.tables(), &["A".to_string(), "B".to_string()]);

    let a = manager.table("A").unwrap();
    assert_eq!(a.count().await.unwrap(), 2);
    assert_eq!(a.get("k1").await.unwrap(), Some(StoredValue::from(vec![1u8])));

    manager.drop_table("B").await.unwrap();
    assert_eq!(manager.tables(), &["A".to_string()]);
    assert!(matches!(
        manager.table("B"),
        Err(SchemaError::UnknownTable(_))
    ));
    assert_eq!(manager.table("A").unwrap().count().await.unwrap(), 2);
    assert_eq!(manager.version(), 4);
}

#[tokio::test]
async fn test_handles_from_before_migration_are_stale() {
    let (_store, mut manager) = memory_manager();
    manager.open().await.unwrap();
    manager.add_table("A").await.unwrap();
    let before = manager.table("A").unwrap();

    manager.add_table("B").await.unwrap();

    assert!(matches!(
        before.count().await,
        Err(StoreError::StaleHandle { .. })
    ));
}

#[tokio::test]
async fn test_add_existing_table_rejected() {
    let (_store, mut manager) = memory_manager();
    manager.open().await.unwrap();
    manager.add_table("A").await.unwrap();

    let result = manager.add_table("A").await;
    assert!(matches!(result, Err(SchemaError::TableExists(_))));
    assert_eq!(manager.version(), 2, "Rejected add must not bump the version");
}

#[tokio::test]
async fn test_add_empty_name_rejected() {
    let (_store, mut manager) = memory_manager();
    manager.open().await.unwrap();

    assert!(matches!(
        manager.add_table("").await,
        Err(SchemaError::InvalidTableName(_))
    ));
}

#[tokio::test]
async fn test_drop_unknown_table_rejected_without_bump() {
    let (_store, mut manager) = memory_manager();
    manager.open().await.unwrap();
    manager.add_table("A").await.unwrap();

    let result = manager.drop_table("nope").await;
    assert!(matches!(result, Err(SchemaError::UnknownTable(_))));
    assert_eq!(manager.version(), 2);
    assert_eq!(manager.tables(), &["A".to_string()]);
}

#[tokio::test]
async fn test_reopen_rederives_bookkeeping() {
    let store = Arc::new(MemoryStore::new("tile-maps"));
    {
        let mut manager = SchemaManager::new(store.clone());
        manager.open().await.unwrap();
        manager.add_table("A").await.unwrap();
        manager.add_table("B").await.unwrap();
    }
    store.close().await;

    let mut manager = SchemaManager::new(store);
    let tables = manager.open().await.unwrap().to_vec();
    assert_eq!(tables, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(manager.version(), 3);
}

/// Engine wrapper whose `open` can be made to fail.
struct FlakyStore {
    inner: MemoryStore,
    fail_open: AtomicBool,
}

impl StoreEngine for FlakyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn open(&self) -> BoxFuture<'_, Result<OpenOutcome, StoreError>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err::<OpenOutcome, _>(StoreError::Io(std::io::Error::other("disk unplugged")))
            });
        }
        self.inner.open()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn session(&self) -> Option<u64> {
        self.inner.session()
    }

    fn declare_version(&self, version: u32, fragment: SchemaFragment) -> Result<(), StoreError> {
        self.inner.declare_version(version, fragment)
    }

    fn has_table(&self, table: &str) -> bool {
        self.inner.has_table(table)
    }

    fn get<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredValue>, StoreError>> {
        self.inner.get(table, key)
    }

    fn put<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
        value: StoredValue,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.put(table, key, value)
    }

    fn delete<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<bool, StoreError>> {
        self.inner.delete(table, key)
    }

    fn clear<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.clear(table)
    }

    fn count<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<u64, StoreError>> {
        self.inner.count(table)
    }
}

#[tokio::test]
async fn test_failed_migration_keeps_committed_bookkeeping() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new("tile-maps"),
        fail_open: AtomicBool::new(false),
    });
    let mut manager = SchemaManager::new(store.clone());
    manager.open().await.unwrap();
    manager.add_table("A").await.unwrap();

    store.fail_open.store(true, Ordering::SeqCst);
    let result = manager.add_table("B").await;

    match result {
        Err(SchemaError::Migration { table, version, .. }) => {
            assert_eq!(table, "B");
            assert_eq!(version, 3);
        }
        other => panic!("Expected migration error, got {:?}", other),
    }
    assert_eq!(manager.tables(), &["A".to_string()]);
    assert_eq!(manager.version(), 2);
}

#[tokio::test]
async fn test_open_failure_is_store_unavailable() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new("tile-maps"),
        fail_open: AtomicBool::new(true),
    });
    let mut manager = SchemaManager::new(store);

    assert!(matches!(
        manager.open().await,
        Err(SchemaError::StoreUnavailable(_))
    ));
}
