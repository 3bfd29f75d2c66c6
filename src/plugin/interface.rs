//! Plugin interface definition.
//!
//! Defines the interface plugins must implement and the read-only context
//! every extraction operation receives.

use crate::core::{Result, ResultMap};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Output of one plugin: namespace key to result object.
pub type PluginOutput = BTreeMap<String, ResultMap>;

/// Plugin information.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique module name
    pub name: String,
    /// Version
    pub version: String,
    /// Description
    pub description: String,
    /// Author
    pub author: String,
    /// Modules that must run before this one
    pub dependencies: Vec<String>,
}

impl PluginInfo {
    /// Create new plugin info.
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            description: String::new(),
            author: String::new(),
            dependencies: Vec::new(),
        }
    }

    /// Set description.
    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = desc.to_string();
        self
    }

    /// Set author.
    pub fn with_author(mut self, author: &str) -> Self {
        self.author = author.to_string();
        self
    }

    /// Add dependency.
    pub fn with_dependency(mut self, dep: &str) -> Self {
        self.dependencies.push(dep.to_string());
        self
    }
}

/// Category of an extraction operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Pulls facts out of the input
    Extract,
    /// Derives judgements from facts already extracted
    Analyze,
    /// Flags the presence of a feature
    Detect,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Extract => write!(f, "extract"),
            OperationKind::Analyze => write!(f, "analyze"),
            OperationKind::Detect => write!(f, "detect"),
        }
    }
}

/// A named extraction operation and the namespace it writes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    /// Operation name, unique within its plugin
    pub name: String,
    /// Operation category
    pub kind: OperationKind,
    /// Namespace key the result is stored under
    pub namespace: String,
}

impl Operation {
    /// Create a new operation.
    pub fn new(kind: OperationKind, name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            namespace: namespace.to_string(),
        }
    }

    /// An `extract` operation.
    pub fn extract(name: &str, namespace: &str) -> Self {
        Self::new(OperationKind::Extract, name, namespace)
    }

    /// An `analyze` operation.
    pub fn analyze(name: &str, namespace: &str) -> Self {
        Self::new(OperationKind::Analyze, name, namespace)
    }

    /// A `detect` operation.
    pub fn detect(name: &str, namespace: &str) -> Self {
        Self::new(OperationKind::Detect, name, namespace)
    }
}

/// Everything the loader needs to know about a plugin.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    /// Declared dependencies, deduplicated, in declaration order
    pub dependencies: Vec<String>,
    /// Operations in invocation order
    pub operations: Vec<Operation>,
}

impl PluginDescriptor {
    /// Read the descriptor of a plugin.
    pub fn from_plugin(plugin: &dyn Plugin) -> Self {
        let info = plugin.info();
        let mut dependencies: Vec<String> = Vec::new();
        for dep in plugin.dependencies() {
            if !dependencies.contains(&dep) {
                dependencies.push(dep);
            }
        }

        Self {
            name: info.name,
            version: info.version,
            author: info.author,
            description: info.description,
            dependencies,
            operations: plugin.operations(),
        }
    }

    /// Names of the callable entry points.
    pub fn entry_points(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.name.as_str()).collect()
    }

    /// Namespace keys this plugin writes, in operation order.
    pub fn namespaces(&self) -> Vec<&str> {
        self.operations.iter().map(|op| op.namespace.as_str()).collect()
    }
}

/// Context handed to plugin factories at discovery time.
#[derive(Clone, Debug)]
pub struct PluginContext {
    /// Settings from the plugin manifest
    pub config: HashMap<String, serde_json::Value>,
    /// Directory the manifest was found in
    pub data_dir: PathBuf,
}

impl PluginContext {
    /// Create a new context.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: HashMap::new(),
            data_dir: data_dir.into(),
        }
    }

    /// Get config value.
    pub fn get_config<T: for<'de> serde::Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.config.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set config value.
    pub fn set_config(&mut self, key: &str, value: serde_json::Value) {
        self.config.insert(key.to_string(), value);
    }
}

impl Default for PluginContext {
    fn default() -> Self {
        Self::new("plugins")
    }
}

/// Read-only input of every extraction operation.
///
/// `prior_results` is shared behind an `Arc`; each stage of a run gets a
/// fresh snapshot, so a plugin never observes results changing under it.
#[derive(Clone, Debug)]
pub struct ExtractionContext {
    file_path: PathBuf,
    file_size: u64,
    file_extension: String,
    prior_results: Arc<BTreeMap<String, PluginOutput>>,
}

impl ExtractionContext {
    /// Create a context from known file facts.
    pub fn new(file_path: impl Into<PathBuf>, file_size: u64) -> Self {
        let file_path = file_path.into();
        let file_extension = file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        Self {
            file_path,
            file_size,
            file_extension,
            prior_results: Arc::new(BTreeMap::new()),
        }
    }

    /// Create a context by reading file-system metadata.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        Ok(Self::new(path, metadata.len()))
    }

    /// Replace the prior results.
    pub fn with_prior_results(&self, prior_results: BTreeMap<String, PluginOutput>) -> Self {
        Self {
            prior_results: Arc::new(prior_results),
            ..self.clone()
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Lowercase extension without the dot; empty when absent.
    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    pub fn prior_results(&self) -> &BTreeMap<String, PluginOutput> {
        &self.prior_results
    }

    /// Output of a module that already ran.
    pub fn prior(&self, module: &str) -> Option<&PluginOutput> {
        self.prior_results.get(module)
    }

    /// One namespace of a module that already ran.
    pub fn prior_namespace(&self, module: &str, namespace: &str) -> Option<&ResultMap> {
        self.prior(module).and_then(|output| output.get(namespace))
    }
}

/// Result type for plugin operations.
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Plugin-specific error.
#[derive(Clone, Debug)]
pub struct PluginError {
    /// Error message
    pub message: String,
    /// Error code
    pub code: i32,
    /// Is recoverable
    pub recoverable: bool,
}

impl PluginError {
    /// Create a new error.
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            code: -1,
            recoverable: true,
        }
    }

    /// Create a fatal error.
    pub fn fatal(message: &str) -> Self {
        Self {
            message: message.to_string(),
            code: -1,
            recoverable: false,
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for PluginError {}

/// Plugin trait that all plugins must implement.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Static metadata record.
    fn info(&self) -> PluginInfo;

    /// Dynamic metadata, computed on request.
    fn metadata(&self) -> ResultMap {
        match serde_json::to_value(self.info()) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => ResultMap::new(),
        }
    }

    /// Declared dependencies.
    fn dependencies(&self) -> Vec<String> {
        self.info().dependencies
    }

    /// Operations this plugin exposes, in invocation order.
    fn operations(&self) -> Vec<Operation>;

    /// Run one operation.
    async fn run(&self, operation: &Operation, ctx: &ExtractionContext) -> PluginResult<ResultMap>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::testing::MockPlugin;
    use serde_json::json;

    #[test]
    fn test_plugin_info() {
        let info = PluginInfo::new("image_analysis", "1.0.0")
            .with_description("Heuristic image analysis")
            .with_author("MetaExtract Team")
            .with_dependency("image");

        assert_eq!(info.name, "image_analysis");
        assert_eq!(info.dependencies, vec!["image".to_string()]);
    }

    #[test]
    fn test_plugin_context() {
        let mut ctx = PluginContext::default();
        ctx.set_config("threshold", json!(42));

        let value: Option<u64> = ctx.get_config("threshold");
        assert_eq!(value, Some(42));
        let missing: Option<u64> = ctx.get_config("other");
        assert_eq!(missing, None);
    }

    #[test]
    fn test_descriptor_dedups_dependencies() {
        let plugin = MockPlugin::new("b").depends_on(&["a", "a", "c"]);
        let descriptor = PluginDescriptor::from_plugin(&plugin);

        assert_eq!(descriptor.dependencies, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(descriptor.entry_points(), vec!["extract_b"]);
        assert_eq!(descriptor.namespaces(), vec!["b"]);
    }

    #[test]
    fn test_extraction_context_facts() {
        let ctx = ExtractionContext::new("/media/Photo.JPG", 2048);

        assert_eq!(ctx.file_extension(), "jpg");
        assert_eq!(ctx.file_size(), 2048);
        assert!(ctx.prior_results().is_empty());
    }

    #[test]
    fn test_extraction_context_prior() {
        let mut output = PluginOutput::new();
        let mut map = ResultMap::new();
        map.insert("format".into(), json!("JPEG"));
        output.insert("image".into(), map);

        let mut prior = BTreeMap::new();
        prior.insert("image".to_string(), output);

        let base = ExtractionContext::new("a.jpg", 1);
        let ctx = base.with_prior_results(prior);

        assert!(base.prior("image").is_none());
        assert_eq!(
            ctx.prior_namespace("image", "image").and_then(|m| m.get("format")),
            Some(&json!("JPEG"))
        );
    }

    #[tokio::test]
    async fn test_context_from_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"12345").unwrap();

        let ctx = ExtractionContext::from_path(file.path()).await.unwrap();
        assert_eq!(ctx.file_size(), 5);
    }

    #[test]
    fn test_default_metadata_mirrors_info() {
        let plugin = MockPlugin::new("a");
        let metadata = plugin.metadata();
        assert_eq!(metadata.get("name"), Some(&json!("a")));
    }

    #[test]
    fn test_plugin_error_display() {
        let err = PluginError::fatal("boom").with_code(7);
        assert!(!err.recoverable);
        assert_eq!(err.to_string(), "boom (code 7)");
    }
}
