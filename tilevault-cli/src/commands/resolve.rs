//! `tilevault resolve` - look a tile URL up in the cache.

use std::path::PathBuf;

use clap::Args;
use console::style;

use tilevault::config::ConfigFile;
use tilevault::resolver::{Resolution, TileSrc};

use super::common::open_default_pipeline;
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Tile URL as the map would request it
    pub url: String,

    /// Table to serve from
    #[arg(long)]
    pub table: Option<String>,

    /// Write cached tile bytes to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Print the tile as a data: URL
    #[arg(long)]
    pub data_url: bool,
}

/// Resolve a tile and report where it would be displayed from.
pub async fn run(args: ResolveArgs, config: &ConfigFile) -> Result<(), CliError> {
    let pipeline = open_default_pipeline(config).await?;
    if let Some(table) = &args.table {
        pipeline.set_table(table).await?;
    }
    let resolver = pipeline.resolver();

    let tile = match resolver.resolve(&args.url).await {
        Resolution::Cached(tile) => tile,
        Resolution::Miss(reason) => {
            println!("{} {:?}", style("miss").yellow(), reason);
            if let TileSrc::Network(url) | TileSrc::Placeholder(url) =
                resolver.tile_src(&args.url).await
            {
                println!("fallback: {}", url);
            }
            return Ok(());
        }
    };

    println!(
        "{} {} ({}, {} bytes)",
        style("hit").green(),
        tile.key,
        tile.content_type,
        tile.data.len()
    );
    if args.data_url {
        println!("{}", tile.data_url());
    }
    if let Some(path) = &args.output {
        std::fs::write(path, &tile.data).map_err(|error| CliError::FileWrite {
            path: path.display().to_string(),
            error,
        })?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}
