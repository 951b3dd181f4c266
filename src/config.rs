use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "CP_CONFIG";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct ProfileConfig {
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub timeout: Option<u64>,
    pub output: Option<String>,
    pub show_usage: Option<bool>,
    pub wiki_lang: Option<String>,
    pub wiki_max_docs: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot resolve config path: set CP_CONFIG or HOME/XDG_CONFIG_HOME.")]
    NoConfigPath,
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Config file '{}' does not contain a [profiles] section.", path.display())]
    NoProfiles { path: PathBuf },
    #[error("Profile '{name}' not found in config file '{}'.", path.display())]
    ProfileNotFound { name: String, path: PathBuf },
    #[error("Invalid profile {field} '{value}' in profile '{profile}': {reason}")]
    InvalidField {
        profile: String,
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

pub fn load_profile(name: &str) -> Result<ProfileConfig, ConfigError> {
    let path = config_path()?;
    let profiles = read_profiles(&path)?;
    let profile = profiles
        .get(name)
        .cloned()
        .ok_or_else(|| ConfigError::ProfileNotFound {
            name: name.to_string(),
            path: path.clone(),
        })?;
    validate_profile(name, &profile)?;
    Ok(profile)
}

/// Checks the config file, either every profile or only `profile`, and returns its path.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    let profiles = read_profiles(&path)?;

    match profile {
        Some(name) => {
            let config = profiles
                .get(name)
                .ok_or_else(|| ConfigError::ProfileNotFound {
                    name: name.to_string(),
                    path: path.clone(),
                })?;
            validate_profile(name, config)?;
        }
        None => {
            let mut names: Vec<&String> = profiles.keys().collect();
            names.sort();
            for name in names {
                validate_profile(name, &profiles[name])?;
            }
        }
    }

    Ok(path)
}

fn read_profiles(path: &Path) -> Result<HashMap<String, ProfileConfig>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_profiles(&raw, path)
}

fn parse_profiles(raw: &str, path: &Path) -> Result<HashMap<String, ProfileConfig>, ConfigError> {
    let config: ConfigFile = toml::from_str(raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    config.profiles.ok_or_else(|| ConfigError::NoProfiles {
        path: path.to_path_buf(),
    })
}

fn validate_profile(name: &str, profile: &ProfileConfig) -> Result<(), ConfigError> {
    let invalid = |field: &'static str, value: String, reason: &'static str| ConfigError::InvalidField {
        profile: name.to_string(),
        field,
        value,
        reason,
    };

    if let Some(model) = &profile.model {
        if model.trim().is_empty() {
            return Err(invalid("model", model.clone(), "must not be empty"));
        }
    }
    if let Some(output) = &profile.output {
        if output != "text" && output != "json" {
            return Err(invalid("output", output.clone(), "expected text or json"));
        }
    }
    if let Some(temperature) = profile.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(invalid(
                "temperature",
                temperature.to_string(),
                "expected a value between 0 and 2",
            ));
        }
    }
    if profile.max_tokens == Some(0) {
        return Err(invalid("max_tokens", "0".to_string(), "must be positive"));
    }
    if profile.timeout == Some(0) {
        return Err(invalid("timeout", "0".to_string(), "must be positive"));
    }
    if profile.wiki_max_docs == Some(0) {
        return Err(invalid("wiki_max_docs", "0".to_string(), "must be positive"));
    }
    Ok(())
}

/// `CP_CONFIG`, then `$XDG_CONFIG_HOME/chainpipe/config.toml`, then `~/.config/chainpipe/config.toml`.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed));
        }
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let trimmed = xdg.trim();
        if !trimmed.is_empty() {
            return Ok(PathBuf::from(trimmed).join("chainpipe").join("config.toml"));
        }
    }

    let home = env::var("HOME").map_err(|_| ConfigError::NoConfigPath)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("chainpipe")
        .join("config.toml"))
}
