#![forbid(unsafe_code)]

//! TCE CLI
//!
//! Downloads TESS light curves for TCE candidates and catalogues them.

use anyhow::Result;
use clap::Parser;
use tce_cli::cli::{Cli, Command, RunArgs};
use tce_cli::config_handlers::handle_config_command;
use tce_cli::{commands, logging};
use tce_core::HarvestConfig;
use tce_core::config::ConfigManager;

/// Loads the configuration and installs logging.
fn setup(config_path: Option<&str>, verbose: u8) -> Result<HarvestConfig> {
    let config = HarvestConfig::load(config_path)?;
    logging::init(&config.logging, verbose)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Run(RunArgs::default()));

    match command {
        Command::Run(args) => {
            let config = setup(config_path, cli.verbose)?;
            commands::run(config, &args).await?;
        }
        Command::Plan(args) => {
            let config = setup(config_path, cli.verbose)?;
            commands::plan(config, &args, &mut std::io::stdout().lock())?;
        }
        Command::Status { tic, json } => {
            let config = setup(config_path, cli.verbose)?;
            commands::status(&config, tic, json, &mut std::io::stdout().lock()).await?;
        }
        Command::Config { action } => handle_config_command(config_path, action)?,
    }

    Ok(())
}
