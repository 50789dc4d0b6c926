//! Harvester configuration.
//!
//! Configuration is read from a TOML file and then overridden by `TCE_*`
//! environment variables, so a container can run with no file at all.
//!
//! File resolution order:
//! 1. an explicit path (`--config`)
//! 2. the `TCE_CONFIG` environment variable
//! 3. `<config dir>/tce/config.toml`
//!
//! A missing file is not an error; defaults apply.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::table::{SECTORS_COLUMN, TIC_COLUMN};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TCE_CONFIG";

/// Number of catalogue rows processed in test mode.
pub const TEST_MODE_LIMIT: usize = 10;

// ============================================================================
// ConfigManager
// ============================================================================

/// Behaviour shared by configuration types the CLI can manage.
pub trait ConfigManager: Serialize + DeserializeOwned + Default {
    /// Project name used for the config directory and messages.
    fn project_name() -> &'static str;

    /// Default config file location for this platform.
    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(Self::project_name()).join("config.toml"))
    }

    /// Resolve the config file path from an explicit path or the defaults.
    fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        Self::default_config_path()
    }

    /// Load configuration from the resolved path, falling back to defaults.
    fn load(explicit: Option<&str>) -> Result<Self>;

    /// Serialize to a pretty TOML document.
    fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }

    /// Flatten into `(VAR, value)` pairs for environment export.
    fn to_env_vars(&self) -> Result<Vec<(String, String)>>;
}

// ============================================================================
// HarvestConfig
// ============================================================================

/// Top-level harvester configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HarvestConfig {
    /// Catalogue input
    pub input: InputConfig,
    /// FITS cache
    pub cache: CacheConfig,
    /// SQLite catalog
    pub catalog: CatalogConfig,
    /// Worker pool and task planning
    pub harvest: HarvestSection,
    /// Retry policy for archive calls
    pub retry: RetryConfig,
    /// MAST archive client
    pub mast: MastConfig,
    /// Log output
    pub logging: LoggingConfig,
}

/// Catalogue input settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Path to the TCE catalogue CSV
    pub csv_path: PathBuf,
    /// Column holding the TIC id
    pub tic_column: String,
    /// Column holding the sector list
    pub sectors_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("tces.csv"),
            tic_column: TIC_COLUMN.to_string(),
            sectors_column: SECTORS_COLUMN.to_string(),
        }
    }
}

/// FITS cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root of the light-curve cache
    pub dir: PathBuf,
    /// Make the cache root mode 0777 for arbitrary-UID containers
    pub world_writable: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/mnt/data/TCEs_LCs"),
            world_writable: true,
        }
    }
}

/// SQLite catalog settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Database file
    pub database: PathBuf,
    /// Records per transaction
    pub commit_every: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("tce_database.db"),
            commit_every: 100,
        }
    }
}

/// How catalogue rows map onto archive downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SectorMode {
    /// One download per row: the best product across the row's sectors.
    #[default]
    FirstMatch,
    /// One download per `(tic, sector)` pair.
    EachSector,
}

/// Worker pool and planning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSection {
    /// Concurrent downloads
    pub workers: usize,
    /// Process only the first N tasks
    pub limit: Option<usize>,
    /// Row-to-task mapping
    pub sector_mode: SectorMode,
}

impl Default for HarvestSection {
    fn default() -> Self {
        Self {
            workers: 8,
            limit: None,
            sector_mode: SectorMode::FirstMatch,
        }
    }
}

/// Retry policy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per task, including the first
    pub max_attempts: usize,
    /// Linear backoff step in seconds
    pub step_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step_secs: 3,
        }
    }
}

impl RetryConfig {
    /// Backoff step as a duration.
    pub fn step(&self) -> Duration {
        Duration::from_secs(self.step_secs)
    }
}

/// MAST client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MastConfig {
    /// Portal base URL
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Also accept 20-second cadence (`fast-lc`) files
    pub include_fast: bool,
    /// Restrict to these pipeline authors (empty = any)
    pub authors: Vec<String>,
}

impl Default for MastConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mast.stsci.edu".to_string(),
            timeout_secs: 120,
            include_fast: false,
            authors: Vec::new(),
        }
    }
}

impl MastConfig {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Log file (in addition to stderr); `None` disables it
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some(PathBuf::from("processing.log")),
        }
    }
}

impl HarvestConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Apply `TCE_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TCE_CSV") {
            self.input.csv_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TCE_CACHE_DIR") {
            self.cache.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TCE_DATABASE") {
            self.catalog.database = PathBuf::from(v);
        }
        if let Some(v) = lookup("TCE_WORKERS") {
            self.harvest.workers = parse_env("TCE_WORKERS", &v)?;
        }
        if let Some(v) = lookup("TCE_LIMIT") {
            self.harvest.limit = if v.is_empty() {
                None
            } else {
                Some(parse_env("TCE_LIMIT", &v)?)
            };
        }
        if let Some(v) = lookup("TCE_LOG_FILE") {
            self.logging.file = if v.is_empty() {
                None
            } else {
                Some(PathBuf::from(v))
            };
        }
        if let Some(v) = lookup("TCE_MAST_URL") {
            self.mast.base_url = v;
        }
        Ok(())
    }

    /// Loads configuration, reading `TCE_CONFIG` and the `TCE_*`
    /// overrides through `lookup`.
    ///
    /// A file named by `explicit` or `TCE_CONFIG` must exist; only the
    /// platform default location may be absent.
    pub fn load_with_env<F>(explicit: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let named = explicit
            .map(PathBuf::from)
            .or_else(|| lookup(CONFIG_ENV).filter(|p| !p.is_empty()).map(PathBuf::from));

        let mut config = match named {
            Some(path) if path.exists() => {
                tracing::debug!(path = %path.display(), "Loading configuration");
                Self::from_file(&path)?
            }
            Some(path) => {
                return Err(Error::config(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
            None => match Self::default_config_path() {
                Some(path) if path.exists() => {
                    tracing::debug!(path = %path.display(), "Loading configuration");
                    Self::from_file(&path)?
                }
                _ => Self::default(),
            },
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Limit processing to the test-mode row count.
    pub fn enable_test_mode(&mut self) {
        self.harvest.limit = Some(TEST_MODE_LIMIT);
    }

    /// Check values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.harvest.workers == 0 {
            return Err(Error::validation_field(
                "harvest.workers",
                "must be at least 1",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::validation_field(
                "retry.max_attempts",
                "must be at least 1",
            ));
        }
        if self.catalog.commit_every == 0 {
            return Err(Error::validation_field(
                "catalog.commit_every",
                "must be at least 1",
            ));
        }
        if self.mast.timeout_secs == 0 {
            return Err(Error::validation_field(
                "mast.timeout_secs",
                "must be at least 1",
            ));
        }
        if self.mast.base_url.is_empty() {
            return Err(Error::validation_field("mast.base_url", "must not be empty"));
        }
        Ok(())
    }
}

impl ConfigManager for HarvestConfig {
    fn project_name() -> &'static str {
        "tce"
    }

    fn load(explicit: Option<&str>) -> Result<Self> {
        Self::load_with_env(explicit, |key| std::env::var(key).ok())
    }

    fn to_env_vars(&self) -> Result<Vec<(String, String)>> {
        let mut vars = vec![
            ("TCE_CSV".to_string(), self.input.csv_path.display().to_string()),
            ("TCE_CACHE_DIR".to_string(), self.cache.dir.display().to_string()),
            (
                "TCE_DATABASE".to_string(),
                self.catalog.database.display().to_string(),
            ),
            ("TCE_WORKERS".to_string(), self.harvest.workers.to_string()),
            ("TCE_MAST_URL".to_string(), self.mast.base_url.clone()),
        ];
        if let Some(limit) = self.harvest.limit {
            vars.push(("TCE_LIMIT".to_string(), limit.to_string()));
        }
        if let Some(file) = &self.logging.file {
            vars.push(("TCE_LOG_FILE".to_string(), file.display().to_string()));
        }
        Ok(vars)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("{key}={value} is not a valid number")))
}
