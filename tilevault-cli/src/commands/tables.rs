//! `tilevault tables` - list stored tables.

use tilevault::config::ConfigFile;

use super::common::open_default_pipeline;
use crate::error::CliError;

/// List tables with their row counts.
pub async fn run(config: &ConfigFile) -> Result<(), CliError> {
    let pipeline = open_default_pipeline(config).await?;
    let tables = pipeline.tables().await;

    println!(
        "Store '{}' at {} (version {})",
        config.store.name,
        config.store_path().display(),
        pipeline.version().await
    );

    if tables.is_empty() {
        println!("  No tables. Save a region with 'tilevault save'.");
        return Ok(());
    }

    let width = tables.iter().map(String::len).max().unwrap_or(0);
    for table in &tables {
        let rows = pipeline.table_size(table).await?;
        println!("  {:<width$}  {:>8} tile(s)", table, rows, width = width);
    }
    Ok(())
}
