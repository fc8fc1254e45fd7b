//! TOML-based engine configuration.
//!
//! Stores the engine defaults:
//! - Floor applied to blocks created from templates
//! - Capacity of newly created sequences
//! - Which blocks absorb a resize (neighbor only or all flexible blocks)
//! - Underflow policy for newly created sequences
//!
//! Configuration is stored at `~/.config/magnetline/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::compression::CompressionScope;
use crate::error::{ConfigError, Result};
use crate::sequence::{UnderflowPolicy, DEFAULT_CAPACITY_MINUTES, DEFAULT_FLOOR_MINUTES};

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/magnetline/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_floor_minutes")]
    pub default_floor_minutes: u32,
    #[serde(default = "default_capacity_minutes")]
    pub default_capacity_minutes: u32,
    /// Pool used when a resize overflows the window.
    #[serde(default)]
    pub resize_scope: CompressionScope,
    #[serde(default)]
    pub default_underflow: UnderflowPolicy,
}

fn default_floor_minutes() -> u32 {
    DEFAULT_FLOOR_MINUTES
}
fn default_capacity_minutes() -> u32 {
    DEFAULT_CAPACITY_MINUTES
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_floor_minutes: default_floor_minutes(),
            default_capacity_minutes: default_capacity_minutes(),
            resize_scope: CompressionScope::default(),
            default_underflow: UnderflowPolicy::default(),
        }
    }
}

/// Returns `~/.config/magnetline[-dev]/` based on MAGNETLINE_ENV.
///
/// Set MAGNETLINE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("MAGNETLINE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("magnetline-dev")
    } else {
        base_dir.join("magnetline")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

impl EngineConfig {
    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load or return default without touching disk on failure.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get a config value as string by key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match json.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key. Returns error if key is unknown or the
    /// value does not parse for that key.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let existing = obj
            .get(key)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let new_value = match existing {
            serde_json::Value::Number(_) => value
                .parse::<u32>()
                .map(serde_json::Value::from)
                .map_err(|e| invalid(e.to_string()))?,
            _ => serde_json::Value::String(value.to_string()),
        };
        obj.insert(key.to_string(), new_value);

        *self = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        Ok(())
    }
}
