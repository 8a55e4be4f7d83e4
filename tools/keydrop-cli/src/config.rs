//! CLI configuration.

use std::path::Path;

use anyhow::{Context, Result};
use keydrop_commerce::ShopConfig;
use serde::{Deserialize, Serialize};

/// File names searched for, in order, from the working directory upward.
pub const CONFIG_FILE_NAMES: [&str; 3] = ["keydrop.toml", ".keydrop.toml", "keydrop.json"];

/// CLI configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Storefront tunables.
    #[serde(default)]
    pub shop: ShopConfig,

    /// Database location.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CliConfig {
    /// Load config from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        if path.extension().map_or(false, |e| e == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
        }
    }

    /// Save config to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = if path.extension().map_or(false, |e| e == "json") {
            serde_json::to_string_pretty(self)?
        } else {
            toml::to_string_pretty(self)?
        };

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, relative to the config file's directory.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "keydrop.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level for keydrop crates; `RUST_LOG` overrides.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Generate a default keydrop.toml config file.
pub fn generate_default_config() -> String {
    r#"# Keydrop storefront configuration

[shop]
order_number_prefix = "ORD"
max_quantity_per_item = 99
currency = "IDR"

[database]
path = "keydrop.db"

[logging]
level = "warn"
# format = "json"
"#
    .to_string()
}
