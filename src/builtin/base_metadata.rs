//! File-level facts every other plugin builds on.

use crate::builtin::format::{human_size, mime_type};
use crate::core::ResultMap;
use crate::plugin::interface::{
    ExtractionContext, Operation, Plugin, PluginContext, PluginInfo, PluginResult,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub const NAME: &str = "base_metadata";
pub const NAMESPACE: &str = "file";

/// Name, size and type of the input file.
#[derive(Debug, Default)]
pub struct BaseMetadataPlugin;

impl BaseMetadataPlugin {
    pub fn new() -> Self {
        Self
    }

    pub fn factory(_ctx: &PluginContext) -> PluginResult<Arc<dyn Plugin>> {
        Ok(Arc::new(Self::new()))
    }
}

#[async_trait]
impl Plugin for BaseMetadataPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(NAME, env!("CARGO_PKG_VERSION"))
            .with_description("Basic file facts")
            .with_author("MetaExtract")
    }

    fn operations(&self) -> Vec<Operation> {
        vec![Operation::extract("extract_file_info", NAMESPACE)]
    }

    async fn run(&self, _operation: &Operation, ctx: &ExtractionContext) -> PluginResult<ResultMap> {
        let name = ctx
            .file_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut map = ResultMap::new();
        map.insert("name".into(), json!(name));
        map.insert("extension".into(), json!(ctx.file_extension()));
        map.insert("size_bytes".into(), json!(ctx.file_size()));
        map.insert("size_human".into(), json!(human_size(ctx.file_size())));
        map.insert("mime_type".into(), json!(mime_type(ctx.file_extension())));
        Ok(map)
    }
}
