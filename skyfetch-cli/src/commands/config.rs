//! Configuration CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use clap::Subcommand;
use skyfetch::config::config_file_path;
use skyfetch::ClientConfig;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
        ConfigCommands::Show => run_show(),
        ConfigCommands::Init { force } => run_init(force),
    }
}

fn run_show() -> Result<(), CliError> {
    let config = ClientConfig::load()?;
    let mut out = Vec::new();
    config.to_ini().write_to(&mut out)?;
    print!("{}", String::from_utf8_lossy(&out));
    Ok(())
}

fn run_init(force: bool) -> Result<(), CliError> {
    let path = config_file_path();
    if path.exists() && !force {
        return Err(CliError::Usage(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ClientConfig::default().save_to(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
