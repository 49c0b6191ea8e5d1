//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use tilevault::config::ConfigFileError;
use tilevault::http::TileFetchError;
use tilevault::save::SaveError;
use tilevault::schema::SchemaError;
use tilevault::source::SourceError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Tile layer could not be built
    Source(SourceError),
    /// HTTP client could not be built
    Http(TileFetchError),
    /// Store, schema or save failure
    Save(SaveError),
    /// Failed to read an input file
    FileRead { path: String, error: std::io::Error },
    /// Failed to write output file
    FileWrite { path: String, error: std::io::Error },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Save(SaveError::ZoomTooLow { minimal, .. }) => {
                eprintln!();
                eprintln!(
                    "Zoom in to at least level {} with --current-zoom, or list levels with --zoom.",
                    minimal
                );
            }
            CliError::Save(SaveError::Schema(SchemaError::UnknownTable(_))) => {
                eprintln!();
                eprintln!("Run 'tilevault tables' to list the stored tables.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "{}", msg),
            CliError::Source(e) => write!(f, "Invalid tile layer: {}", e),
            CliError::Http(e) => write!(f, "Failed to create HTTP client: {}", e),
            CliError::Save(e) => write!(f, "{}", e),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read file '{}': {}", path, error)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Source(e) => Some(e),
            CliError::Http(e) => Some(e),
            CliError::Save(e) => Some(e),
            CliError::FileRead { error, .. } => Some(error),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SourceError> for CliError {
    fn from(e: SourceError) -> Self {
        CliError::Source(e)
    }
}

impl From<TileFetchError> for CliError {
    fn from(e: TileFetchError) -> Self {
        CliError::Http(e)
    }
}

impl From<SaveError> for CliError {
    fn from(e: SaveError) -> Self {
        CliError::Save(e)
    }
}
