//! `tilevault drop` - remove a table and its tiles.

use std::sync::Arc;

use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;

use tilevault::config::ConfigFile;
use tilevault::save::{RemovalGate, SaveStatus};
use tilevault::store::BoxFuture;

use super::common::open_default_pipeline;
use crate::error::CliError;

/// Asks on the terminal before a table is dropped.
struct PromptRemovalGate;

impl RemovalGate for PromptRemovalGate {
    fn confirm<'a>(&'a self, table: &'a str, status: &'a SaveStatus) -> BoxFuture<'a, bool> {
        let prompt = match status.storage_size {
            Some(rows) => format!("Drop table '{}' and its {} tile(s)?", table, rows),
            None => format!("Drop table '{}'?", table),
        };
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(prompt)
                    .default(false)
                    .interact()
                    .unwrap_or(false)
            })
            .await
            .unwrap_or(false)
        })
    }
}

/// Drop `table`, asking first unless `yes` is set.
pub async fn run(table: &str, yes: bool, config: &ConfigFile) -> Result<(), CliError> {
    let pipeline = open_default_pipeline(config).await?;
    pipeline.set_table(table).await?;
    pipeline.refresh_storage_size().await?;
    if !yes {
        pipeline.set_removal_gate(Some(Arc::new(PromptRemovalGate)));
    }

    if pipeline.remove_active_table().await? {
        println!("Dropped table '{}'", table);
    } else {
        println!("Kept table '{}'", table);
    }
    Ok(())
}
