//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tce_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Filter directives for a configured level and `-v` count.
///
/// Database statement logging is kept at `warn` unless asked for
/// explicitly through `RUST_LOG`.
pub fn directives(level: &str, verbose: u8) -> String {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    format!("{level},sqlx=warn")
}

/// Installs the global subscriber: stderr, plus the configured log file
/// without ANSI colours. `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig, verbose: u8) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directives(&config.level, verbose))
            .with_context(|| format!("invalid log level '{}'", config.level))?,
    };

    let file_layer = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}
