//! Basic image facts guessed from the file extension.

use crate::builtin::base_metadata;
use crate::builtin::format::ImageFormat;
use crate::core::ResultMap;
use crate::plugin::interface::{
    ExtractionContext, Operation, Plugin, PluginContext, PluginInfo, PluginResult,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub const NAME: &str = "image";
pub const NAMESPACE: &str = "image";

#[derive(Debug, Default)]
pub struct ImagePlugin;

impl ImagePlugin {
    pub fn new() -> Self {
        Self
    }

    pub fn factory(_ctx: &PluginContext) -> PluginResult<Arc<dyn Plugin>> {
        Ok(Arc::new(Self::new()))
    }
}

#[async_trait]
impl Plugin for ImagePlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(NAME, env!("CARGO_PKG_VERSION"))
            .with_description("Image format detection by extension")
            .with_author("MetaExtract")
            .with_dependency(base_metadata::NAME)
    }

    fn operations(&self) -> Vec<Operation> {
        vec![Operation::extract("extract_image_info", NAMESPACE)]
    }

    async fn run(&self, _operation: &Operation, ctx: &ExtractionContext) -> PluginResult<ResultMap> {
        let mut map = ResultMap::new();

        match ImageFormat::from_extension(ctx.file_extension()) {
            Some(format) => {
                map.insert("is_image".into(), json!(true));
                map.insert("format".into(), json!(format.name()));
                map.insert("mime_type".into(), json!(format.mime_type()));
                map.insert("is_vector".into(), json!(format.is_vector()));
            }
            None => {
                map.insert("is_image".into(), json!(false));
            }
        }

        Ok(map)
    }
}
