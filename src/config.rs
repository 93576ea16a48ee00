//! Top-level application configuration.
//!
//! Configuration is stored in `.pantry/config.yaml` (or wherever
//! `PANTRY_CONFIG` points) and includes:
//! - The sentinel category items fall back to
//! - The filter label that bypasses category filtering
//! - Avatar colour saturation and lightness
//! - The timeout applied to every store request

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PantryError, Result};
use crate::types::{ALL_CATEGORIES, SENTINEL_CATEGORY};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "PANTRY_CONFIG";

/// Default directory holding local pantry state.
pub const PANTRY_DIR: &str = ".pantry";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Category items are moved to when theirs is deleted (default: "Other")
    #[serde(default = "default_sentinel_category")]
    pub sentinel_category: String,

    /// Filter value that shows every category (default: "All")
    #[serde(default = "default_all_categories_label")]
    pub all_categories_label: String,

    /// Avatar colour settings
    #[serde(default, skip_serializing_if = "AvatarConfig::is_default")]
    pub avatar: AvatarConfig,

    /// Store request timeout in seconds (default: 30)
    #[serde(default = "default_store_timeout")]
    pub store_timeout: u64,

    /// Separator for multi-name shortcut submissions (default: ",")
    #[serde(default = "default_shortcut_separator")]
    pub shortcut_separator: String,
}

fn default_sentinel_category() -> String {
    SENTINEL_CATEGORY.to_string()
}

fn default_all_categories_label() -> String {
    ALL_CATEGORIES.to_string()
}

fn default_store_timeout() -> u64 {
    30
}

fn default_shortcut_separator() -> String {
    ",".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sentinel_category: default_sentinel_category(),
            all_categories_label: default_all_categories_label(),
            avatar: AvatarConfig::default(),
            store_timeout: default_store_timeout(),
            shortcut_separator: default_shortcut_separator(),
        }
    }
}

/// Fixed HSL components for derived avatar colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarConfig {
    #[serde(default = "default_saturation")]
    pub saturation: u8,
    #[serde(default = "default_lightness")]
    pub lightness: u8,
}

fn default_saturation() -> u8 {
    60
}

fn default_lightness() -> u8 {
    70
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            saturation: default_saturation(),
            lightness: default_lightness(),
        }
    }
}

impl AvatarConfig {
    /// Check if this config has default values
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> PathBuf {
        if let Ok(path) = env::var(CONFIG_ENV)
            && !path.is_empty()
        {
            return PathBuf::from(path);
        }
        PathBuf::from(PANTRY_DIR).join("config.yaml")
    }

    /// Load configuration from file, or return default if not found
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            PantryError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config at {}: {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_yaml_ng::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                PantryError::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create directory for config at {}: {}",
                        parent.display(),
                        e
                    ),
                ))
            })?;
        }

        let content = serde_yaml_ng::to_string(self)?;
        fs::write(&path, content).map_err(|e| {
            PantryError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write config at {}: {}", path.display(), e),
            ))
        })?;

        Ok(())
    }

    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.sentinel_category.trim().is_empty() {
            return Err(PantryError::Config(
                "sentinel_category cannot be empty".to_string(),
            ));
        }
        if self.sentinel_category.trim() == self.all_categories_label.trim() {
            return Err(PantryError::Config(format!(
                "sentinel_category and all_categories_label must differ (both '{}')",
                self.sentinel_category
            )));
        }
        if self.shortcut_separator.is_empty() {
            return Err(PantryError::Config(
                "shortcut_separator cannot be empty".to_string(),
            ));
        }
        if self.avatar.saturation > 100 || self.avatar.lightness > 100 {
            return Err(PantryError::Config(
                "avatar saturation and lightness are percentages (0-100)".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the store request timeout duration
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout)
    }

    /// Set the store request timeout in seconds
    pub fn set_store_timeout(&mut self, seconds: u64) {
        self.store_timeout = seconds;
    }
}
