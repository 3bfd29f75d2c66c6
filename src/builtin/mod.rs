//! Built-in plugins.
//!
//! `base_metadata` and `image` provide the facts the enrichment plugins
//! depend on; `image_analysis` is the reference enrichment plugin.

pub mod base_metadata;
pub mod format;
pub mod image;
pub mod image_analysis;

pub use base_metadata::BaseMetadataPlugin;
pub use image::ImagePlugin;
pub use image_analysis::ImageAnalysisPlugin;

use crate::plugin::discovery::PluginCatalog;

/// Catalog with every built-in implementation registered under its module name.
pub fn catalog() -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    catalog
        .register(base_metadata::NAME, BaseMetadataPlugin::factory)
        .register(image::NAME, ImagePlugin::factory)
        .register(image_analysis::NAME, ImageAnalysisPlugin::factory);
    catalog
}
