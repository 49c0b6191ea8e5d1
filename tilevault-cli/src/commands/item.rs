//! `tilevault item` - generic key/value access on a table.

use std::path::PathBuf;

use bytes::Bytes;
use clap::Subcommand;

use tilevault::config::ConfigFile;
use tilevault::store::StoredValue;

use super::common::open_default_pipeline;
use crate::error::CliError;

/// Item subcommands.
#[derive(Debug, Subcommand)]
pub enum ItemAction {
    /// Print an item
    Get {
        key: String,
        /// Write a binary item to this file instead of describing it
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Store an item. VALUE is parsed as JSON, falling back to a string
    Put {
        key: String,
        value: Option<String>,
        /// Store the contents of this file as a binary item
        #[arg(long, conflicts_with = "value")]
        file: Option<PathBuf>,
    },
    /// Delete an item
    Delete { key: String },
}

/// Parse a command-line value as JSON, or as a plain string if it isn't.
fn parse_value(value: &str) -> serde_json::Value {
    serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()))
}

/// Run an item subcommand against `table`.
pub async fn run(table: &str, action: ItemAction, config: &ConfigFile) -> Result<(), CliError> {
    let pipeline = open_default_pipeline(config).await?;
    pipeline.set_table(table).await?;

    match action {
        ItemAction::Get { key, output } => match pipeline.get_item(&key).await? {
            None => println!("(not found)"),
            Some(StoredValue::Item(value)) => println!("{}", value),
            Some(StoredValue::Blob(data)) => match output {
                Some(path) => {
                    std::fs::write(&path, &data).map_err(|error| CliError::FileWrite {
                        path: path.display().to_string(),
                        error,
                    })?;
                    println!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => println!("(binary, {} bytes)", data.len()),
            },
        },
        ItemAction::Put { key, value, file } => {
            let stored = match (value, file) {
                (_, Some(path)) => {
                    let data = std::fs::read(&path).map_err(|error| CliError::FileRead {
                        path: path.display().to_string(),
                        error,
                    })?;
                    StoredValue::Blob(Bytes::from(data))
                }
                (Some(value), None) => StoredValue::Item(parse_value(&value)),
                (None, None) => {
                    return Err(CliError::InvalidArgument(
                        "item put needs a VALUE or --file".to_string(),
                    ))
                }
            };
            pipeline.put_item(&key, stored).await?;
            println!("Stored '{}' in '{}'", key, table);
        }
        ItemAction::Delete { key } => {
            if pipeline.delete_item(&key).await? {
                println!("Deleted '{}'", key);
            } else {
                println!("'{}' was not stored", key);
            }
        }
    }
    Ok(())
}
