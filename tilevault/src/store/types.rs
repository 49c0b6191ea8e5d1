//! Store value, schema and error types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A value held in a table.
///
/// Tile tables hold binary blobs; the generic item API stores arbitrary
/// JSON values alongside them.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Blob(Bytes),
    Item(serde_json::Value),
}

impl StoredValue {
    /// Returns the blob bytes, or `None` for non-blob values.
    pub fn as_blob(&self) -> Option<&Bytes> {
        match self {
            StoredValue::Blob(bytes) => Some(bytes),
            StoredValue::Item(_) => None,
        }
    }

    /// Approximate size of the value in bytes.
    pub fn size(&self) -> usize {
        match self {
            StoredValue::Blob(bytes) => bytes.len(),
            StoredValue::Item(value) => value.to_string().len(),
        }
    }
}

impl From<Bytes> for StoredValue {
    fn from(bytes: Bytes) -> Self {
        StoredValue::Blob(bytes)
    }
}

impl From<Vec<u8>> for StoredValue {
    fn from(bytes: Vec<u8>) -> Self {
        StoredValue::Blob(Bytes::from(bytes))
    }
}

impl From<serde_json::Value> for StoredValue {
    fn from(value: serde_json::Value) -> Self {
        StoredValue::Item(value)
    }
}

/// Schema change declared for one version.
///
/// Each entry maps a table name to `Some(index definition)` to declare the
/// table or `None` to drop it. An empty definition is an unindexed,
/// key-only table. Later entries for the same name replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaFragment {
    entries: Vec<(String, Option<String>)>,
}

impl SchemaFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragment declaring every named table as unindexed.
    pub fn from_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fragment = Self::new();
        for table in tables {
            fragment = fragment.declare(table, "");
        }
        fragment
    }

    pub fn declare(mut self, table: impl Into<String>, definition: impl Into<String>) -> Self {
        self.set(table.into(), Some(definition.into()));
        self
    }

    pub fn drop_table(mut self, table: impl Into<String>) -> Self {
        self.set(table.into(), None);
        self
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(name, def)| (name.as_str(), def.as_deref()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn set(&mut self, table: String, definition: Option<String>) {
        match self.entries.iter_mut().find(|(name, _)| *name == table) {
            Some(entry) => entry.1 = definition,
            None => self.entries.push((table, definition)),
        }
    }
}

/// A table declared in a committed schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    #[serde(default)]
    pub definition: String,
}

/// The committed schema of a store: its version and ordered table list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub version: u32,
    pub tables: Vec<TableDef>,
}

impl Schema {
    pub fn table_names(&self) -> Vec<String> {
        self.tables.iter().map(|t| t.name.clone()).collect()
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.name == table)
    }
}

/// Result of opening a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The store exists; `tables` is its committed table list in order.
    Found { version: u32, tables: Vec<String> },
    /// Nothing was declared and nothing is persisted yet.
    Absent,
}

impl From<&Schema> for OpenOutcome {
    fn from(schema: &Schema) -> Self {
        OpenOutcome::Found {
            version: schema.version,
            tables: schema.table_names(),
        }
    }
}

/// Errors raised by store engines and table handles.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store manifest is corrupt: {0}")]
    Manifest(String),

    #[error("stored value is corrupt: {0}")]
    Value(String),

    #[error("store '{0}' is closed")]
    Closed(String),

    #[error("handle for table '{table}' is stale: the store was reopened")]
    StaleHandle { table: String },

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("invalid schema version: {0}")]
    InvalidVersion(u32),

    #[error("declared version {declared} is lower than the stored version {persisted}")]
    VersionConflict { declared: u32, persisted: u32 },

    #[error("versions cannot be declared while store '{0}' is open")]
    DeclareWhileOpen(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_later_entry_replaces_earlier() {
        let fragment = SchemaFragment::new().declare("a", "").drop_table("a");
        let entries: Vec<_> = fragment.entries().collect();
        assert_eq!(entries, vec![("a", None)]);
    }

    #[test]
    fn test_fragment_from_tables_keeps_order() {
        let fragment = SchemaFragment::from_tables(["z", "a", "m"]);
        let names: Vec<_> = fragment.entries().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
        assert!(fragment.entries().all(|(_, def)| def == Some("")));
    }

    #[test]
    fn test_stored_value_blob_accessor() {
        let blob = StoredValue::from(vec![1u8, 2, 3]);
        assert_eq!(blob.as_blob().map(|b| b.len()), Some(3));
        assert_eq!(blob.size(), 3);

        let item = StoredValue::from(serde_json::json!({"a": 1}));
        assert!(item.as_blob().is_none());
    }

    #[test]
    fn test_schema_serializes_without_definition() {
        let schema: Schema =
            serde_json::from_str(r#"{"version":3,"tables":[{"name":"osm"}]}"#).unwrap();
        assert_eq!(schema.version, 3);
        assert!(schema.contains("osm"));
        assert_eq!(schema.tables[0].definition, "");
    }
}
