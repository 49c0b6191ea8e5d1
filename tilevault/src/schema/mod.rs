//! Schema management
//!
//! [`SchemaManager`] adds and removes tables one version at a time while
//! preserving every other table's rows. [`SelectedTable`] records which
//! table a component reads from or writes to.

mod error;
mod manager;
mod selected;

pub use error::SchemaError;
pub use manager::{SchemaManager, INITIAL_VERSION};
pub use selected::SelectedTable;

#[cfg(test)]
mod tests;
