//! Plugin Module
//!
//! Provides the metadata-enrichment plugin registry:
//! - Plugin interface and extraction context
//! - Manifest discovery and dependency-aware loading
//! - Bounded-parallel dispatch with timeouts and cancellation
//! - Namespaced result merging

pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod host;
pub mod interface;
pub mod loader;
pub mod merger;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

pub use config::PluginConfig;
pub use discovery::{discover, Discovery, PluginCatalog, PluginManifest};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use host::PluginHost;
pub use interface::{
    ExtractionContext, Operation, OperationKind, Plugin, PluginContext, PluginDescriptor,
    PluginError, PluginInfo, PluginOutput, PluginResult,
};
pub use loader::{resolve, ExecutionPlan, LoadOutcome, LoadReport, LoadedPlugin, PluginCandidate};
pub use merger::{merge, ResultDocument};
pub use report::{ExtractionReport, MissingNamespace};
