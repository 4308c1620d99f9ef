//! CLI error types and exit codes

use rosterwatch_core::CoreError;
use rosterwatch_entra::{ConfigError, EntraError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: No membership changes
/// - 1: Changes detected
/// - 2: Configuration or input error
/// - 3: Authentication or directory service error
/// - 4: Snapshot or artifact write error
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Directory request failed: {0}")]
    Network(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) | CliError::Input(_) => 2,
            CliError::Auth(_) | CliError::Network(_) => 3,
            CliError::Snapshot(_) | CliError::Io(_) => 4,
        }
    }

    /// Print the error to stderr with appropriate formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => Some(
                "Set TENANT_ID, CLIENT_ID and CLIENT_SECRET, and pass --groups-file or --groups-filter.",
            ),
            CliError::Auth(_) => {
                Some("Check the app registration secret and its Graph application permissions.")
            }
            CliError::Snapshot(_) => Some("Check that the output directory is writable."),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<EntraError> for CliError {
    fn from(e: EntraError) -> Self {
        match e {
            EntraError::Config(inner) => CliError::Config(inner.to_string()),
            EntraError::Auth(msg) => CliError::Auth(msg),
            other => CliError::Network(other.to_string()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Fetch(source) => match source.downcast::<EntraError>() {
                Ok(entra) => CliError::from(*entra),
                Err(other) => CliError::Network(other.to_string()),
            },
            CoreError::InvalidSelection(msg) => CliError::Input(msg),
            other @ CoreError::SnapshotWrite { .. } => CliError::Snapshot(other.to_string()),
            other => CliError::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}
