//! Version declarations and reconciliation against a persisted schema.
//!
//! Engines collect [`SchemaFragment`]s per version while closed. On open,
//! the fragments are folded in ascending version order into a target table
//! list, which is then diffed against whatever the engine has persisted.

use std::collections::BTreeMap;

use super::types::{Schema, SchemaFragment, StoreError, TableDef};

/// Changes an engine must apply to move from its persisted schema to the
/// declared one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPlan {
    pub target: Schema,
    /// Tables to create empty.
    pub created: Vec<String>,
    /// Tables to remove together with their rows.
    pub dropped: Vec<String>,
}

impl SchemaPlan {
    /// True when the persisted schema already matches the target.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.dropped.is_empty()
    }
}

/// Versions declared since the last successful open.
#[derive(Debug, Clone, Default)]
pub struct VersionHistory {
    declared: BTreeMap<u32, SchemaFragment>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the fragment for `version`, replacing any earlier
    /// declaration of the same version.
    pub fn declare(&mut self, version: u32, fragment: SchemaFragment) -> Result<(), StoreError> {
        if version == 0 {
            return Err(StoreError::InvalidVersion(version));
        }
        self.declared.insert(version, fragment);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.declared.is_empty()
    }

    pub fn highest(&self) -> Option<u32> {
        self.declared.keys().next_back().copied()
    }

    pub fn clear(&mut self) {
        self.declared.clear();
    }

    /// Folds every declared fragment in ascending version order.
    ///
    /// Returns `None` when nothing has been declared.
    pub fn fold(&self) -> Option<Schema> {
        let version = self.highest()?;
        let mut tables: Vec<TableDef> = Vec::new();

        for fragment in self.declared.values() {
            for (name, definition) in fragment.entries() {
                let existing = tables.iter().position(|t| t.name == name);
                match (definition, existing) {
                    (Some(def), Some(index)) => tables[index].definition = def.to_string(),
                    (Some(def), None) => tables.push(TableDef {
                        name: name.to_string(),
                        definition: def.to_string(),
                    }),
                    (None, Some(index)) => {
                        tables.remove(index);
                    }
                    (None, None) => {}
                }
            }
        }

        Some(Schema { version, tables })
    }

    /// Computes the plan that takes `persisted` to the declared schema.
    ///
    /// Returns `Ok(None)` when nothing has been declared, meaning the
    /// persisted schema (if any) is used unchanged.
    pub fn plan(&self, persisted: Option<&Schema>) -> Result<Option<SchemaPlan>, StoreError> {
        let Some(target) = self.fold() else {
            return Ok(None);
        };

        let Some(persisted) = persisted else {
            let created = target.table_names();
            return Ok(Some(SchemaPlan {
                target,
                created,
                dropped: Vec::new(),
            }));
        };

        if target.version < persisted.version {
            return Err(StoreError::VersionConflict {
                declared: target.version,
                persisted: persisted.version,
            });
        }

        let created = target
            .tables
            .iter()
            .filter(|t| !persisted.contains(&t.name))
            .map(|t| t.name.clone())
            .collect();
        let dropped = persisted
            .tables
            .iter()
            .filter(|t| !target.contains(&t.name))
            .map(|t| t.name.clone())
            .collect();

        Ok(Some(SchemaPlan {
            target,
            created,
            dropped,
        }))
    }
}
