//! Handlers for `tce config` subcommands.
//!
//! The handlers are generic over [`ConfigManager`] and write to any
//! [`Write`] sink; [`handle_config_command`] binds them to
//! [`HarvestConfig`] and stdout.

use std::io::Write;
use std::path::PathBuf;

use tce_core::config::ConfigManager;
use tce_core::{Error, HarvestConfig, Result};

use crate::cli::ConfigAction;

// ============================================================================
// Dispatch
// ============================================================================

/// Runs a config subcommand against [`HarvestConfig`], printing to stdout.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    let mut out = std::io::stdout().lock();
    match action {
        ConfigAction::Path => config_path_cmd::<HarvestConfig>(config_path, &mut out),
        ConfigAction::Get { key } => config_get::<HarvestConfig>(config_path, &key, &mut out),
        ConfigAction::Set { key, value } => {
            config_set::<HarvestConfig>(config_path, &key, &value, &mut out)
        }
        ConfigAction::Init { file, force } => {
            config_init::<HarvestConfig>(file.as_deref(), force, &mut out)
        }
        ConfigAction::Export { docker_env } => {
            let config = HarvestConfig::load(config_path)?;
            config_export(&config, docker_env, &mut out)
        }
    }
}

// ============================================================================
// Generic handlers
// ============================================================================

/// Prints the resolved config file path.
pub fn config_path_cmd<C: ConfigManager>(config_path: Option<&str>, out: &mut impl Write) -> Result<()> {
    let path = C::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory for this platform"))?;
    writeln!(out, "{}", path.display())?;
    if !path.exists() {
        eprintln!(
            "(file does not exist; run `{} config init` to create it)",
            C::project_name()
        );
    }
    Ok(())
}

/// Prints one value of the effective configuration.
pub fn config_get<C: ConfigManager>(
    config_path: Option<&str>,
    key: &str,
    out: &mut impl Write,
) -> Result<()> {
    let config = C::load(config_path)?;
    let tree = toml::Value::try_from(&config).map_err(|e| Error::config(e.to_string()))?;
    let value = get_nested_value(&tree, key)
        .ok_or_else(|| Error::config(format!("Key '{key}' not found in configuration")))?;
    writeln!(out, "{}", format_toml_value(value))?;
    Ok(())
}

/// Sets a value in the config file.
///
/// The edited document must still deserialize into `C`; otherwise the file
/// is left untouched.
pub fn config_set<C: ConfigManager>(
    config_path: Option<&str>,
    key: &str,
    value: &str,
    out: &mut impl Write,
) -> Result<()> {
    let path = C::resolve_config_path(config_path)
        .ok_or_else(|| Error::config("Could not determine config directory"))?;
    if !path.exists() {
        return Err(Error::config(format!(
            "Config file does not exist at {}. Run `{} config init` first.",
            path.display(),
            C::project_name()
        )));
    }

    let content = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
    let mut doc: toml::Value = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {e}", path.display())))?;

    set_nested_value(&mut doc, key, parse_value(value))?;

    let rendered = toml::to_string_pretty(&doc).map_err(|e| Error::config(e.to_string()))?;
    toml::from_str::<C>(&rendered)
        .map_err(|e| Error::config(format!("Invalid value for {key}: {e}")))?;
    std::fs::write(&path, rendered).map_err(|e| Error::io_with_path(e, &path))?;

    writeln!(out, "Set {key} = {value} in {}", path.display())?;
    Ok(())
}

/// Writes a default config file.
pub fn config_init<C: ConfigManager>(
    file: Option<&str>,
    force: bool,
    out: &mut impl Write,
) -> Result<()> {
    let path = match file {
        Some(p) => PathBuf::from(p),
        None => C::default_config_path()
            .ok_or_else(|| Error::config("Could not determine config directory"))?,
    };

    if path.exists() && !force {
        return Err(Error::config(format!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(e, parent))?;
    }

    std::fs::write(&path, C::default().to_toml_string()?)
        .map_err(|e| Error::io_with_path(e, &path))?;

    writeln!(out, "Config file created at {}", path.display())?;
    Ok(())
}

/// Prints the configuration as `TCE_*` variables.
pub fn config_export<C: ConfigManager>(config: &C, docker_env: bool, out: &mut impl Write) -> Result<()> {
    for (key, value) in config.to_env_vars()? {
        if docker_env {
            writeln!(out, "--env {key}={value}")?;
        } else {
            writeln!(out, "{key}={value}")?;
        }
    }
    Ok(())
}

// ============================================================================
// Dotted-key helpers
// ============================================================================

/// Looks up a dotted key in a TOML tree.
pub fn get_nested_value<'a>(value: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(value, |current, part| current.as_table()?.get(part))
}

/// Sets a dotted key, creating intermediate tables.
pub fn set_nested_value(root: &mut toml::Value, key: &str, value: toml::Value) -> Result<()> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let last = parts
        .pop()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::config("Empty key path"))?;

    let mut current = root;
    for part in parts {
        let table = current
            .as_table_mut()
            .ok_or_else(|| Error::config(format!("Cannot navigate into '{part}'")))?;
        current = table
            .entry(part.to_string())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    current
        .as_table_mut()
        .ok_or_else(|| Error::config(format!("Cannot set '{last}' on a non-table value")))?
        .insert(last.to_string(), value);
    Ok(())
}

/// Parses a CLI string into the most specific TOML value:
/// bool, integer, float, then string.
pub fn parse_value(s: &str) -> toml::Value {
    match s {
        "true" => return toml::Value::Boolean(true),
        "false" => return toml::Value::Boolean(false),
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return toml::Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return toml::Value::Float(f);
    }
    toml::Value::String(s.to_string())
}

/// Renders a TOML value for stdout.
pub fn format_toml_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::Array(_) | toml::Value::Table(_) => {
            toml::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
        }
    }
}
