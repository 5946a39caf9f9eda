//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{join_errors, validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// Parse and validate configuration from TOML text.
///
/// Keys a `[[breakers]]` entry leaves out are taken from `[defaults]`.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let mut raw: toml::Table = toml::from_str(content)?;
    inherit_defaults(&mut raw);
    let config: AppConfig = toml::Value::Table(raw).try_into()?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn inherit_defaults(raw: &mut toml::Table) {
    let Some(toml::Value::Table(defaults)) = raw.get("defaults").cloned() else {
        return;
    };
    let Some(toml::Value::Array(breakers)) = raw.get_mut("breakers") else {
        return;
    };
    for entry in breakers.iter_mut() {
        if let toml::Value::Table(entry) = entry {
            for (key, value) in &defaults {
                if !entry.contains_key(key) {
                    entry.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
