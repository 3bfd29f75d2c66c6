//! Application configuration.
//!
//! One JSON document with a section per concern:
//!
//! ```json
//! {
//!   "plugins": { "enabled": true, "default_path": "plugins", "timeout_ms": 10000 },
//!   "logging": { "level": "debug", "format": "json" }
//! }
//! ```

use crate::core::Result;
use crate::monitoring::logging::LoggerConfig;
use crate::plugin::config::PluginConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Plugin system section
    pub plugins: PluginConfig,
    /// Logging section
    pub logging: LoggerConfig,
}

impl Config {
    /// Load and validate configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.plugins.validate()
    }
}
