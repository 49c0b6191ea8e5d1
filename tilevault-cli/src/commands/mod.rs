//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (path, show, init)
//! - [`drop`] - Drop a stored table
//! - [`item`] - Generic item access on a table
//! - [`resolve`] - Resolve a tile URL through the cache
//! - [`save`] - Save a map region into a table
//! - [`tables`] - List stored tables

pub mod common;
pub mod config;
pub mod drop;
pub mod item;
pub mod resolve;
pub mod save;
pub mod tables;
