//! Cache management CLI commands.

use clap::Subcommand;
use skyfetch::ClientConfig;

use super::{start_client, targets, TargetArg};
use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove every cached response from the given backends (default: all)
    Clear {
        #[arg(short, long = "target", value_enum)]
        targets: Vec<TargetArg>,
    },
    /// Evict expired entries now
    Sweep,
    /// Show which cache backends are available
    Info,
}

/// Run a cache subcommand.
pub async fn run(action: CacheAction) -> Result<(), CliError> {
    let client = start_client().await?;

    match action {
        CacheAction::Clear { targets: args } => {
            let requested = targets(&args);
            let cleared = client.invalidate_caches(requested.as_deref()).await;
            println!("Cleared {} cache backend(s)", cleared);
        }
        CacheAction::Sweep => {
            let report = client.sweep_now().await;
            println!("{}", report);
        }
        CacheAction::Info => {
            let config: &ClientConfig = client.config();
            println!("Cache directory: {}", config.cache_dir.display());
            println!("Memory limit:    {} bytes", config.memory_cache_bytes);
            println!("Sweep interval:  {}s", config.sweep_interval.as_secs());
            let available: Vec<String> = client
                .available_targets()
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("Backends:        {}", available.join(", "));
        }
    }

    client.shutdown().await;
    Ok(())
}
