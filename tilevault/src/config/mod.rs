//! Configuration file for tilevault.
//!
//! Settings live in `~/.tilevault/config.ini`, one `[section]` per concern:
//!
//! ```ini
//! [store]
//! directory = ~/.local/share/tilevault
//! name = tile-maps
//!
//! [source]
//! url = https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png
//! subdomains = abc
//!
//! [save]
//! minimal_zoom = 8
//! max_zoom = 19
//! concurrency = 0
//! ```
//!
//! A missing file yields defaults. Values are validated on load; an invalid
//! value fails with [`ConfigFileError::InvalidValue`] naming the section
//! and key.

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::*;
