//! Logging setup for binaries built on the library.
//!
//! Installs a `tracing` subscriber with an env filter (`RUST_LOG` wins over
//! the verbosity flag), a human-readable stderr layer and, optionally, a
//! daily-rolling log file written off-thread.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::APP_DIR_NAME;

/// Log file name prefix; the appender adds the date.
pub const LOG_FILE_PREFIX: &str = "skyfetch.log";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to install log subscriber: {0}")]
    Init(String),
}

/// Keeps the file writer alive; dropping it flushes buffered log lines.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Default directory for log files (`<local data dir>/skyfetch/logs`).
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("logs")
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "skyfetch=debug,info"
    } else {
        "skyfetch=info,warn"
    }
}

/// Installs the global subscriber.
///
/// # Arguments
///
/// * `verbose` - Log the library at debug level unless `RUST_LOG` is set
/// * `log_dir` - Also write to a daily-rolling file in this directory
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Result<LoggingGuard, LoggingError> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter());

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::Directory {
                path: dir.to_path_buf(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert!(default_directive(true).contains("skyfetch=debug"));
        assert!(default_directive(false).contains("skyfetch=info"));
    }

    #[test]
    fn test_default_log_dir() {
        assert!(default_log_dir().ends_with("skyfetch/logs"));
    }
}
