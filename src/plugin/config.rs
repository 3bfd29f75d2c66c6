//! Plugin system configuration.

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Plugin system configuration.
///
/// Passed to the host at construction; there is no process-wide toggle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Discovery is a no-op unless set
    pub enabled: bool,
    /// Primary plugin directory
    pub default_path: PathBuf,
    /// Secondary plugin directory
    pub alternate_path: Option<PathBuf>,
    /// Any further directories, scanned last
    pub extra_paths: Vec<PathBuf>,
    /// Per-plugin invocation timeout (milliseconds)
    pub timeout_ms: u64,
    /// Plugins allowed to run at the same time
    pub max_concurrency: usize,
}

impl PluginConfig {
    /// Default configuration with plugins switched on.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the enablement flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Replace the primary directory.
    pub fn with_default_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_path = path.into();
        self
    }

    /// Replace the secondary directory.
    pub fn with_alternate_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.alternate_path = Some(path.into());
        self
    }

    /// Append a directory.
    pub fn with_extra_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.extra_paths.push(path.into());
        self
    }

    /// Set the per-plugin timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the concurrency bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Directories to scan, in order, without repeats.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::with_capacity(2 + self.extra_paths.len());
        let candidates = std::iter::once(&self.default_path)
            .chain(self.alternate_path.iter())
            .chain(self.extra_paths.iter());

        for path in candidates {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths
    }

    /// Check the configuration for values the dispatcher cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrency == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_path: PathBuf::from("plugins"),
            alternate_path: Some(PathBuf::from("external_plugins")),
            extra_paths: Vec::new(),
            timeout_ms: 30_000,
            max_concurrency: 4,
        }
    }
}
