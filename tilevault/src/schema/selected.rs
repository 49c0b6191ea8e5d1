//! Shared reference to the currently selected table.

use std::sync::Arc;

use parking_lot::RwLock;

/// Name of the table a component currently works against.
///
/// Cloning yields another handle to the same selection, so the save
/// pipeline and the resolver can share what is being served.
#[derive(Debug, Clone, Default)]
pub struct SelectedTable {
    inner: Arc<RwLock<Option<String>>>,
}

impl SelectedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.inner.read().clone()
    }

    pub fn is_selected(&self, table: &str) -> bool {
        self.inner.read().as_deref() == Some(table)
    }

    pub fn set(&self, table: impl Into<String>) {
        *self.inner.write() = Some(table.into());
    }

    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    /// Clears the selection if it is `table`. Returns whether it was.
    pub fn clear_if(&self, table: &str) -> bool {
        let mut selected = self.inner.write();
        if selected.as_deref() == Some(table) {
            *selected = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_selection() {
        let a = SelectedTable::new();
        let b = a.clone();

        a.set("osm");
        assert_eq!(b.get().as_deref(), Some("osm"));
        assert!(b.is_selected("osm"));

        assert!(!b.clear_if("other"));
        assert!(b.clear_if("osm"));
        assert_eq!(a.get(), None);
    }
}
