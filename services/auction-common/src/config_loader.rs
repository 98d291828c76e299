//! Modular configuration loader.
//!
//! Supports loading configuration from multiple files:
//! - `config.json` - Core configuration (observability, vendor endpoint)
//! - `secrets.json` - Credentials (vendor token)
//! - `screener.json` - Screening thresholds, pool sizing and output
//!
//! Files are loaded from `~/.auction-screener/` and deep-merged.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;
use crate::error::{Error, Result, ResultExt};

/// Configuration file names
pub const CONFIG_FILES: &[&str] = &["config.json", "secrets.json", "screener.json"];

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content =
        fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
pub(crate) fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => merge_json(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Merge `section` into `config[key]`, creating the key if absent.
fn merge_section(config: &mut Value, key: &str, section: Value) {
    if let Some(config_obj) = config.as_object_mut() {
        match config_obj.get_mut(key) {
            Some(existing) => merge_json(existing, section),
            None => {
                config_obj.insert(key.to_string(), section);
            }
        }
    }
}

/// Load modular configuration from the config directory.
///
/// Priority (lowest to highest):
/// 1. `config.json`
/// 2. `secrets.json` (merged under `secrets`)
/// 3. `screener.json` (merged under `screener`)
///
/// Environment variables are applied afterwards by [`crate::Config::apply_env_overrides`].
pub fn load_modular_config(dir: Option<PathBuf>) -> Result<Value> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    let mut config =
        load_json_file(&cfg_dir.join("config.json"))?.unwrap_or(Value::Object(Default::default()));

    if !config.is_object() {
        return Err(Error::Config(format!(
            "{} must contain a JSON object",
            cfg_dir.join("config.json").display()
        )));
    }

    tracing::debug!("Loading modular config from {}", cfg_dir.display());

    if let Some(secrets) = load_json_file(&cfg_dir.join("secrets.json"))? {
        merge_section(&mut config, "secrets", secrets);
        tracing::debug!("Loaded secrets.json");
    }

    if let Some(screener) = load_json_file(&cfg_dir.join("screener.json"))? {
        merge_section(&mut config, "screener", screener);
        tracing::debug!("Loaded screener.json");
    }

    Ok(config)
}

/// Check which modular config files exist.
pub fn check_modular_files(dir: Option<PathBuf>) -> Vec<(String, bool)> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    CONFIG_FILES
        .iter()
        .map(|file| (file.to_string(), cfg_dir.join(file).exists()))
        .collect()
}
