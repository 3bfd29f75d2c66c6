//! # MetaExtract - metadata enrichment plugins
//!
//! A dependency-ordered registry for metadata-extraction plugins:
//! - **Loader**: discovers plugin manifests and orders plugins by dependency
//! - **Dispatcher**: runs plugins with bounded parallelism, timeouts and cancellation
//! - **Merger**: folds plugin outputs into a namespaced result document
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metaextract::plugin::{PluginConfig, PluginHost};
//!
//! #[tokio::main]
//! async fn main() -> metaextract::Result<()> {
//!     let config = PluginConfig::enabled().with_default_path("plugins");
//!     let host = PluginHost::new(config, metaextract::builtin::catalog())?;
//!     host.reload().await?;
//!
//!     let report = host.extract("photo.jpg").await?;
//!     println!("{}", serde_json::to_string_pretty(&report.document)?);
//!     Ok(())
//! }
//! ```

pub mod builtin;
pub mod config;
pub mod core;
pub mod monitoring;
pub mod plugin;

pub use crate::core::error::{Error, ExecutionError, LoadError, Result};
