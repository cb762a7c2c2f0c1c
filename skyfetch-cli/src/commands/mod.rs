//! CLI subcommands.

pub mod cache;
pub mod config;
pub mod fetch;

use clap::ValueEnum;
use skyfetch::{CacheTarget, Client, ClientConfig, ResponseType};

use crate::error::CliError;

/// Cache backend selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum TargetArg {
    /// Process-local memory cache
    Memory,
    /// Persistent on-disk cache
    Disk,
}

impl From<TargetArg> for CacheTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Memory => CacheTarget::Memory,
            TargetArg::Disk => CacheTarget::Disk,
        }
    }
}

/// Response shape selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Text,
    Bytes,
}

impl From<ResponseKind> for ResponseType {
    fn from(kind: ResponseKind) -> Self {
        match kind {
            ResponseKind::Json => ResponseType::Json,
            ResponseKind::Text => ResponseType::Text,
            ResponseKind::Bytes => ResponseType::Bytes,
        }
    }
}

/// Converts target arguments; an empty list means "all backends".
pub fn targets(args: &[TargetArg]) -> Option<Vec<CacheTarget>> {
    if args.is_empty() {
        None
    } else {
        Some(args.iter().copied().map(CacheTarget::from).collect())
    }
}

/// Loads the user's configuration and starts a client.
pub async fn start_client() -> Result<Client, CliError> {
    let config = ClientConfig::load()?;
    Ok(Client::start(config).await?)
}
