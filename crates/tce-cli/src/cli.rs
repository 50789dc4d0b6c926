//! Command-line definitions.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use tce_core::HarvestConfig;
use tce_core::config::SectorMode;

/// TESS TCE light-curve harvester
#[derive(Parser, Debug)]
#[command(name = "tce", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Command to run (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download light curves and update the catalog (default)
    Run(RunArgs),

    /// Show the tasks a run would perform, without network access
    Plan(PlanArgs),

    /// Show catalog statistics
    Status {
        /// List the light curves of one target
        #[arg(long)]
        tic: Option<u64>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect and edit the configuration file
    Config {
        /// Config operation
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved config file path
    Path,

    /// Print a value by dotted key (e.g. `harvest.workers`)
    Get {
        /// Dotted key
        key: String,
    },

    /// Set a value by dotted key in the config file
    Set {
        /// Dotted key
        key: String,
        /// New value
        value: String,
    },

    /// Write a default config file
    Init {
        /// Destination (defaults to the platform config directory)
        #[arg(long)]
        file: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration as environment variables
    Export {
        /// Format as `--env KEY=VALUE` for `docker run`
        #[arg(long)]
        docker_env: bool,
    },
}

/// Which tasks to build from the catalogue.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Candidate catalogue (CSV with `tic_id` and `Sectors` columns)
    #[arg(long)]
    pub csv: Option<PathBuf>,

    /// Process only the first N tasks
    #[arg(long)]
    pub limit: Option<usize>,

    /// Test mode: process only the first 10 tasks
    #[arg(long)]
    pub test: bool,

    /// One download per (TIC, sector) instead of one per row
    #[arg(long)]
    pub each_sector: bool,
}

impl SourceArgs {
    /// Applies the flags on top of `config`.
    pub fn apply(&self, config: &mut HarvestConfig) {
        if let Some(csv) = &self.csv {
            config.input.csv_path = csv.clone();
        }
        if let Some(limit) = self.limit {
            config.harvest.limit = Some(limit);
        }
        if self.test {
            config.enable_test_mode();
        }
        if self.each_sector {
            config.harvest.sector_mode = SectorMode::EachSector;
        }
    }
}

/// Arguments of `run`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Catalogue selection
    #[command(flatten)]
    pub source: SourceArgs,

    /// Light-curve cache directory
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// SQLite catalog file
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Concurrent downloads
    #[arg(long)]
    pub workers: Option<usize>,
}

impl RunArgs {
    /// Applies the flags on top of `config`.
    pub fn apply(&self, config: &mut HarvestConfig) {
        self.source.apply(config);
        if let Some(dir) = &self.cache_dir {
            config.cache.dir = dir.clone();
        }
        if let Some(database) = &self.database {
            config.catalog.database = database.clone();
        }
        if let Some(workers) = self.workers {
            config.harvest.workers = workers;
        }
    }
}

/// Arguments of `plan`.
#[derive(Args, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Catalogue selection
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}
