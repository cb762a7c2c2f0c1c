//! CLI error type.

use std::fmt;

use skyfetch::logging::LoggingError;
use skyfetch::http::TransportError;
use skyfetch::{ConfigError, FetchError};

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or saved.
    Config(ConfigError),

    /// Invalid command-line arguments.
    Usage(String),

    /// The client could not be started.
    Startup(TransportError),

    /// A request failed.
    Fetch(FetchError),

    /// Writing output failed.
    Output(std::io::Error),

    /// Logging could not be installed.
    Logging(LoggingError),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Usage(msg) => write!(f, "{}", msg),
            CliError::Startup(e) => write!(f, "Failed to start client: {}", e),
            CliError::Fetch(e) => write!(f, "{}", e),
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::RuntimeCreation(msg) => write!(f, "Failed to create Tokio runtime: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Startup(e) => Some(e),
            CliError::Fetch(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Usage(_) | CliError::RuntimeCreation(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}

impl From<TransportError> for CliError {
    fn from(e: TransportError) -> Self {
        CliError::Startup(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Output(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => 2,
            CliError::Fetch(e) if e.is_cancelled() => 124,
            _ => 1,
        }
    }
}
