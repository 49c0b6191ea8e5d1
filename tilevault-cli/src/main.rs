//! tilevault CLI - Command-line interface
//!
//! Saves map regions into a local tile store and inspects what is stored.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use commands::common::{load_config, start_logging};
use commands::config::ConfigCommands;
use commands::item::ItemAction;
use commands::resolve::ResolveArgs;
use commands::save::SaveArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tilevault")]
#[command(version = tilevault::VERSION)]
#[command(about = "Save map tiles for offline use", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.tilevault/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also print log output to the terminal
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every tile of a region into a table
    Save(SaveArgs),

    /// List stored tables
    Tables,

    /// Drop a table and its tiles
    Drop {
        /// Table name
        name: String,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Resolve a tile URL through the cache
    Resolve(ResolveArgs),

    /// Read, write or delete items of a table
    Item {
        /// Table name
        #[arg(long)]
        table: String,

        #[command(subcommand)]
        action: ItemAction,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        e.exit();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Commands::Config(command) = cli.command {
        return commands::config::run(command, cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let _logging = start_logging(&config, cli.verbose)?;
    info!(version = tilevault::VERSION, store = %config.store_path().display(), "tilevault starting");

    match cli.command {
        Commands::Save(args) => commands::save::run(args, &config).await,
        Commands::Tables => commands::tables::run(&config).await,
        Commands::Drop { name, yes } => commands::drop::run(&name, yes, &config).await,
        Commands::Resolve(args) => commands::resolve::run(args, &config).await,
        Commands::Item { table, action } => commands::item::run(&table, action, &config).await,
        Commands::Config(_) => Ok(()),
    }
}
