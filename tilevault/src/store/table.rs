//! Session-bound table handles.

use std::sync::Arc;

use super::engine::StoreEngine;
use super::types::{StoreError, StoredValue};

/// Handle to one table of an open store.
///
/// A handle is bound to the session it was created in. Once the store is
/// closed or reopened (for example by a schema migration) every operation
/// fails with [`StoreError::StaleHandle`]; obtain a fresh handle instead.
#[derive(Clone)]
pub struct Table {
    engine: Arc<dyn StoreEngine>,
    name: String,
    session: u64,
}

impl Table {
    /// Binds a handle to `name` in the engine's current session.
    pub fn open(engine: Arc<dyn StoreEngine>, name: impl Into<String>) -> Result<Self, StoreError> {
        let name = name.into();
        let session = engine
            .session()
            .ok_or_else(|| StoreError::Closed(engine.name().to_string()))?;
        if !engine.has_table(&name) {
            return Err(StoreError::NoSuchTable(name));
        }
        Ok(Self {
            engine,
            name,
            session,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_stale(&self) -> bool {
        self.engine.session() != Some(self.session)
    }

    fn check(&self) -> Result<(), StoreError> {
        match self.engine.session() {
            Some(session) if session == self.session => Ok(()),
            Some(_) => Err(StoreError::StaleHandle {
                table: self.name.clone(),
            }),
            None => Err(StoreError::Closed(self.engine.name().to_string())),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        self.check()?;
        self.engine.get(&self.name, key).await
    }

    pub async fn put(&self, key: &str, value: impl Into<StoredValue>) -> Result<(), StoreError> {
        self.check()?;
        self.engine.put(&self.name, key, value.into()).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        self.engine.delete(&self.name, key).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.check()?;
        self.engine.clear(&self.name).await
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        self.check()?;
        self.engine.count(&self.name).await
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("store", &self.engine.name())
            .field("name", &self.name)
            .field("session", &self.session)
            .finish()
    }
}
