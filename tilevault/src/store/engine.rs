//! Store engine trait definition for dependency injection.

use super::types::{OpenOutcome, SchemaFragment, StoreError, StoredValue};
use super::BoxFuture;

/// A versioned key-value store holding named tables.
///
/// Engines follow a declare-then-open protocol: while closed, callers
/// declare schema fragments per version with [`declare_version`]; the next
/// [`open`] folds them into the effective schema, creating and dropping
/// tables as needed. Declarations are consumed by a successful open.
///
/// Each successful open starts a new session. Table handles remember the
/// session they were created in and become stale after a close/reopen.
///
/// [`declare_version`]: StoreEngine::declare_version
/// [`open`]: StoreEngine::open
pub trait StoreEngine: Send + Sync {
    /// Name of the store.
    fn name(&self) -> &str;

    /// Opens the store, applying any declared versions.
    ///
    /// Opening an already open store returns its current schema without
    /// starting a new session.
    fn open(&self) -> BoxFuture<'_, Result<OpenOutcome, StoreError>>;

    /// Closes the store. Closing a closed store is a no-op.
    fn close(&self) -> BoxFuture<'_, ()>;

    fn is_open(&self) -> bool;

    /// Identifier of the current session, or `None` while closed.
    fn session(&self) -> Option<u64>;

    /// Declares the schema fragment for `version`.
    ///
    /// Fails with [`StoreError::DeclareWhileOpen`] unless the store is closed.
    fn declare_version(&self, version: u32, fragment: SchemaFragment) -> Result<(), StoreError>;

    /// True if the open store's schema contains `table`.
    fn has_table(&self, table: &str) -> bool;

    fn get<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Option<StoredValue>, StoreError>>;

    fn put<'a>(
        &'a self,
        table: &'a str,
        key: &'a str,
        value: StoredValue,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Removes a key, returning whether it was present.
    fn delete<'a>(&'a self, table: &'a str, key: &'a str)
        -> BoxFuture<'a, Result<bool, StoreError>>;

    /// Removes every row of a table while keeping the table itself.
    fn clear<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;

    fn count<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<u64, StoreError>>;
}
