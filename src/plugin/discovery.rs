//! Plugin discovery.
//!
//! Scans the configured directories for JSON manifests and binds each one to
//! a compiled-in implementation from a [`PluginCatalog`].

use crate::core::LoadError;
use crate::plugin::config::PluginConfig;
use crate::plugin::interface::{Plugin, PluginContext, PluginResult};
use crate::plugin::loader::PluginCandidate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds a plugin instance from its manifest context.
pub type PluginFactory = Arc<dyn Fn(&PluginContext) -> PluginResult<Arc<dyn Plugin>> + Send + Sync>;

/// Compiled-in plugin implementations, by implementation name.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under an implementation name.
    pub fn register<F>(&mut self, implementation: &str, factory: F) -> &mut Self
    where
        F: Fn(&PluginContext) -> PluginResult<Arc<dyn Plugin>> + Send + Sync + 'static,
    {
        self.factories
            .insert(implementation.to_string(), Arc::new(factory));
        self
    }

    pub fn contains(&self, implementation: &str) -> bool {
        self.factories.contains_key(implementation)
    }

    /// Registered implementation names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Instantiate an implementation, if registered.
    pub fn instantiate(
        &self,
        implementation: &str,
        ctx: &PluginContext,
    ) -> Option<PluginResult<Arc<dyn Plugin>>> {
        self.factories.get(implementation).map(|factory| (**factory)(ctx))
    }
}

impl std::fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("implementations", &self.names())
            .finish()
    }
}

/// On-disk plugin manifest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Implementation name in the catalog
    pub plugin: String,
    /// Disabled manifests are ignored
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Passed to the factory
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

/// Everything one discovery pass produced.
#[derive(Default)]
pub struct Discovery {
    /// Instantiated plugins
    pub candidates: Vec<PluginCandidate>,
    /// Manifests that could not be turned into plugins, keyed by path
    pub rejected: BTreeMap<String, LoadError>,
}

impl Discovery {
    /// Wrap already-instantiated plugins.
    pub fn from_candidates(candidates: Vec<PluginCandidate>) -> Self {
        Self {
            candidates,
            rejected: BTreeMap::new(),
        }
    }

    fn reject(&mut self, path: &Path, error: LoadError) {
        warn!(manifest = %path.display(), reason = %error, "Manifest rejected");
        self.rejected.insert(path.display().to_string(), error);
    }
}

/// Scan every configured directory for manifests.
///
/// Returns an empty discovery while plugins are disabled.
pub async fn discover(config: &PluginConfig, catalog: &PluginCatalog) -> Discovery {
    let mut discovery = Discovery::default();

    if !config.enabled {
        info!("Plugins disabled, skipping discovery");
        return discovery;
    }

    for dir in config.search_paths() {
        let manifests = match manifest_paths(&dir).await {
            Ok(paths) => paths,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Plugin directory not found");
                continue;
            }
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Plugin directory unreadable");
                continue;
            }
        };

        debug!(dir = %dir.display(), count = manifests.len(), "Scanning plugin directory");
        for path in manifests {
            load_manifest(&path, catalog, &mut discovery).await;
        }
    }

    info!(
        candidates = discovery.candidates.len(),
        rejected = discovery.rejected.len(),
        "Plugin discovery finished"
    );
    discovery
}

/// `*.json` files directly inside `dir`, sorted by file name.
async fn manifest_paths(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_manifest = path.extension().and_then(|ext| ext.to_str()) == Some("json");
        if is_manifest && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

async fn load_manifest(path: &Path, catalog: &PluginCatalog, discovery: &mut Discovery) {
    let manifest = match read_manifest(path).await {
        Ok(manifest) => manifest,
        Err(reason) => {
            discovery.reject(
                path,
                LoadError::InvalidManifest {
                    path: path.to_path_buf(),
                    reason,
                },
            );
            return;
        }
    };

    if !manifest.enabled {
        info!(manifest = %path.display(), plugin = %manifest.plugin, "Plugin disabled by manifest");
        return;
    }

    let mut ctx = PluginContext::new(path.parent().unwrap_or_else(|| Path::new(".")));
    for (key, value) in manifest.settings {
        ctx.set_config(&key, value);
    }

    match catalog.instantiate(&manifest.plugin, &ctx) {
        Some(Ok(plugin)) => {
            debug!(manifest = %path.display(), plugin = %manifest.plugin, "Plugin instantiated");
            discovery
                .candidates
                .push(PluginCandidate::new(path, plugin));
        }
        Some(Err(e)) => discovery.reject(
            path,
            LoadError::InvalidManifest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        ),
        None => discovery.reject(
            path,
            LoadError::UnknownImplementation {
                path: path.to_path_buf(),
                implementation: manifest.plugin,
            },
        ),
    }
}

async fn read_manifest(path: &Path) -> std::result::Result<PluginManifest, String> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| e.to_string())?;
    serde_json::from_str(&contents).map_err(|e| e.to_string())
}
