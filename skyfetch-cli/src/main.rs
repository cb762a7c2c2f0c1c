//! Skyfetch CLI - fetch imagery through the request middleware.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use skyfetch::logging::{default_log_dir, init_logging};

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "skyfetch", version, about = "Caching, coalescing, retrying fetches for imagery APIs")]
struct Cli {
    /// Log debug output from the middleware
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Also write logs to daily files in the default log directory
    #[arg(long, global = true)]
    log_file: bool,

    /// Write log files to this directory instead (implies --log-file)
    #[arg(long, global = true, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch a URL through the middleware
    Fetch(FetchArgs),

    /// Manage the response caches
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// View or create the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    let log_dir = match cli.log_dir {
        Some(dir) => Some(dir),
        None if cli.log_file => Some(default_log_dir()),
        None => None,
    };
    let _logging = init_logging(cli.verbose, log_dir.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::RuntimeCreation(e.to_string()))?;

    match cli.command {
        Commands::Fetch(args) => runtime.block_on(commands::fetch::run(args)),
        Commands::Cache { action } => runtime.block_on(commands::cache::run(action)),
        Commands::Config { command } => commands::config::run(command),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
