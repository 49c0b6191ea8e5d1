//! `tilevault save` - download a map region into a table.

use std::io::Write;
use std::sync::Arc;

use clap::Args;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use tilevault::config::ConfigFile;
use tilevault::coord::LatLngBounds;
use tilevault::save::{GateDecision, SaveEvent, SaveGate, SaveOutcome, SaveRequest, SaveStatus};
use tilevault::source::{parse_subdomains, TileSource};
use tilevault::store::BoxFuture;
use tilevault::view::StaticView;

use super::common::{open_pipeline, parse_bounds};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct SaveArgs {
    /// Table to save into; an existing table is cleared first
    #[arg(long)]
    pub table: String,

    /// Area to save as north,west,south,east
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    pub bounds: LatLngBounds,

    /// Zoom level to save (repeatable). Levels below the configured minimum are skipped
    #[arg(long = "zoom")]
    pub zoom_levels: Vec<u8>,

    /// Zoom of the map the save starts from; saves every level up to the maximum
    #[arg(long)]
    pub current_zoom: Option<u8>,

    /// Tile URL template, overriding [source] url
    #[arg(long)]
    pub url: Option<String>,

    /// Subdomains for {s}, e.g. "abc" or "t1,t2"
    #[arg(long)]
    pub subdomains: Option<String>,

    /// Simultaneous downloads (default: one per subdomain)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Asks on the terminal before downloading.
struct PromptGate;

impl SaveGate for PromptGate {
    fn confirm<'a>(&'a self, status: &'a SaveStatus) -> BoxFuture<'a, GateDecision> {
        let table = status.target_table.clone().unwrap_or_default();
        let overwrite = status.tables.contains(&table);
        let prompt = format!(
            "Save {} tiles from zoom {} into '{}'{}?",
            status.total,
            status.min_zoom.map(|z| z.to_string()).unwrap_or_else(|| "-".into()),
            table,
            if overwrite { " (replacing its tiles)" } else { "" },
        );

        Box::pin(async move {
            let answer = tokio::task::spawn_blocking(move || {
                Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(prompt)
                    .default(true)
                    .interact()
            })
            .await;

            match answer {
                Ok(Ok(true)) => GateDecision::Proceed,
                Ok(Ok(false)) => GateDecision::Decline,
                Ok(Err(e)) => {
                    warn!(error = %e, "Confirmation prompt failed");
                    GateDecision::Decline
                }
                Err(e) => {
                    warn!(error = %e, "Confirmation prompt task failed");
                    GateDecision::Decline
                }
            }
        })
    }
}

fn build_source(args: &SaveArgs, config: &ConfigFile) -> Result<TileSource, CliError> {
    let mut source = match &args.url {
        Some(url) => TileSource::new(url)?.with_tile_size(config.source.tile_size),
        None => config.tile_source()?,
    };
    if let Some(subdomains) = &args.subdomains {
        let subdomains = parse_subdomains(subdomains);
        if subdomains.is_empty() {
            return Err(CliError::InvalidArgument(
                "--subdomains needs at least one subdomain".to_string(),
            ));
        }
        source = source.with_subdomains(subdomains);
    }
    Ok(source)
}

/// Run a save.
pub async fn run(args: SaveArgs, config: &ConfigFile) -> Result<(), CliError> {
    if args.zoom_levels.is_empty() && args.current_zoom.is_none() {
        return Err(CliError::InvalidArgument(
            "either --zoom or --current-zoom is required".to_string(),
        ));
    }

    let source = build_source(&args, config)?;
    let view = Arc::new(StaticView::new(
        args.current_zoom.unwrap_or(config.save.minimal_zoom),
        args.bounds,
    ));

    let mut config = config.clone();
    if let Some(concurrency) = args.concurrency {
        config.save.concurrency = concurrency;
    }
    let pipeline = open_pipeline(&config, source, view).await?;
    if !args.yes {
        pipeline.set_save_gate(Some(Arc::new(PromptGate)));
    }

    let mut request = SaveRequest::into_table(&args.table).with_bounds(args.bounds);
    if !args.zoom_levels.is_empty() {
        request = request.with_zoom_levels(args.zoom_levels.clone());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!();
                eprintln!("{}", style("Cancelling save...").yellow());
                cancel.cancel();
            }
        })
    };
    let progress = tokio::spawn(print_progress(pipeline.subscribe()));

    let result = pipeline.save(request.with_cancellation(cancel)).await;
    ctrl_c.abort();
    drop(pipeline);
    let _ = progress.await;

    let report = result?;
    println!();
    match report.outcome {
        SaveOutcome::Declined => {
            println!("Save cancelled, nothing downloaded.");
            return Ok(());
        }
        SaveOutcome::Cancelled => println!("{}", style("Save interrupted.").yellow()),
        SaveOutcome::Completed => {}
    }

    println!(
        "Saved {} of {} tiles into '{}' ({} KiB downloaded, peak {} concurrent)",
        report.saved(),
        report.total(),
        args.table,
        report.status.bytes / 1024,
        report.peak_concurrency,
    );
    if !report.failed_keys().is_empty() {
        println!(
            "{}",
            style(format!("{} tile(s) failed:", report.failed_keys().len())).red()
        );
        for key in report.failed_keys().iter().take(10) {
            println!("  {}", key);
        }
        if report.failed_keys().len() > 10 {
            println!("  ... see the log for the rest");
        }
    }
    Ok(())
}

/// Prints a progress line until the pipeline is dropped.
async fn print_progress(mut events: tokio::sync::broadcast::Receiver<SaveEvent>) {
    loop {
        match events.recv().await {
            Ok(SaveEvent::SaveStarted(status)) => {
                println!(
                    "Downloading {} tiles into '{}'",
                    status.total,
                    status.target_table.as_deref().unwrap_or("")
                );
            }
            Ok(SaveEvent::TileSaved(status)) => {
                print!(
                    "\r  {:>6}/{} saved  {:>3}%  {} failed",
                    status.saved,
                    status.total,
                    (status.progress_fraction() * 100.0).round() as u32,
                    status.failed,
                );
                let _ = std::io::stdout().flush();
            }
            Ok(SaveEvent::LoadEnded(status)) if status.total > 0 => {
                println!();
                println!("All {} downloads finished", status.loaded);
            }
            Ok(SaveEvent::TableFinalized(status)) => {
                println!(
                    "{}",
                    style(format!(
                        "Table '{}' complete",
                        status.target_table.as_deref().unwrap_or("")
                    ))
                    .green()
                );
            }
            Ok(_) => {}
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}
