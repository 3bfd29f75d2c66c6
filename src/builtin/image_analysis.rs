//! Heuristic image analysis.
//!
//! Produces format, quality and feature guesses from what `image` and
//! `base_metadata` already extracted. Pixel data is never read, so every
//! value here is an estimate.

use crate::builtin::format::ImageFormat;
use crate::builtin::{base_metadata, image};
use crate::core::ResultMap;
use crate::plugin::interface::{
    ExtractionContext, Operation, Plugin, PluginContext, PluginError, PluginInfo, PluginResult,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

pub const NAME: &str = "image_analysis";
pub const ANALYSIS_NAMESPACE: &str = "image_analysis";
pub const QUALITY_NAMESPACE: &str = "image_quality";
pub const FEATURES_NAMESPACE: &str = "image_features";

const DEFAULT_HIGH_QUALITY_BYTES: u64 = 1024 * 1024;
const DEFAULT_MEDIUM_QUALITY_BYTES: u64 = 200 * 1024;

#[derive(Debug)]
pub struct ImageAnalysisPlugin {
    high_quality_bytes: u64,
    medium_quality_bytes: u64,
}

impl ImageAnalysisPlugin {
    pub fn new() -> Self {
        Self {
            high_quality_bytes: DEFAULT_HIGH_QUALITY_BYTES,
            medium_quality_bytes: DEFAULT_MEDIUM_QUALITY_BYTES,
        }
    }

    /// Reads `high_quality_bytes` and `medium_quality_bytes` from the manifest settings.
    pub fn factory(ctx: &PluginContext) -> PluginResult<Arc<dyn Plugin>> {
        let high = ctx
            .get_config::<u64>("high_quality_bytes")
            .unwrap_or(DEFAULT_HIGH_QUALITY_BYTES);
        let medium = ctx
            .get_config::<u64>("medium_quality_bytes")
            .unwrap_or(DEFAULT_MEDIUM_QUALITY_BYTES);

        if medium >= high {
            return Err(PluginError::new(
                "medium_quality_bytes must be below high_quality_bytes",
            ));
        }

        Ok(Arc::new(Self {
            high_quality_bytes: high,
            medium_quality_bytes: medium,
        }))
    }

    fn format(ctx: &ExtractionContext) -> Option<ImageFormat> {
        ctx.prior_namespace(image::NAME, image::NAMESPACE)
            .and_then(|info| info.get("format"))
            .and_then(|format| format.as_str())
            .and_then(ImageFormat::from_name)
    }

    fn size(ctx: &ExtractionContext) -> u64 {
        ctx.prior_namespace(base_metadata::NAME, base_metadata::NAMESPACE)
            .and_then(|file| file.get("size_bytes"))
            .and_then(|size| size.as_u64())
            .unwrap_or_else(|| ctx.file_size())
    }

    fn analyze_format(format: ImageFormat) -> ResultMap {
        let compression = if format.is_vector() {
            "vector"
        } else if format.is_lossy() {
            "lossy"
        } else {
            "lossless"
        };

        let mut map = ResultMap::new();
        map.insert("format".into(), json!(format.name()));
        map.insert("color_space".into(), json!(format.color_space()));
        map.insert("compression".into(), json!(compression));
        map.insert(
            "supports_transparency".into(),
            json!(format.supports_transparency()),
        );
        map.insert("analysis_method".into(), json!("heuristic"));
        map
    }

    fn analyze_quality(&self, format: ImageFormat, size: u64) -> ResultMap {
        let size_category = match size {
            s if s < 100 * 1024 => "small",
            s if s < 1024 * 1024 => "medium",
            s if s < 10 * 1024 * 1024 => "large",
            _ => "very_large",
        };

        let estimated_quality = if !format.is_lossy() {
            "lossless"
        } else if size >= self.high_quality_bytes {
            "high"
        } else if size >= self.medium_quality_bytes {
            "medium"
        } else {
            "low"
        };

        let mut map = ResultMap::new();
        map.insert("size_category".into(), json!(size_category));
        map.insert("estimated_quality".into(), json!(estimated_quality));
        map.insert("confidence".into(), json!("low"));
        map.insert("method".into(), json!("file_size_heuristic"));
        map
    }

    fn detect_features(format: ImageFormat) -> ResultMap {
        let photographic = matches!(format, ImageFormat::Jpeg | ImageFormat::Heic);

        let mut map = ResultMap::new();
        map.insert("may_be_animated".into(), json!(format.supports_animation()));
        map.insert("may_have_alpha".into(), json!(format.supports_transparency()));
        map.insert("likely_photograph".into(), json!(photographic));
        map.insert("likely_graphic".into(), json!(!photographic));
        map
    }
}

impl Default for ImageAnalysisPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for ImageAnalysisPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo::new(NAME, "1.0.0")
            .with_description("Heuristic format, quality and feature analysis for images")
            .with_author("MetaExtract")
            .with_dependency(base_metadata::NAME)
            .with_dependency(image::NAME)
    }

    fn metadata(&self) -> ResultMap {
        let info = self.info();
        let formats: Vec<&str> = ImageFormat::ALL.iter().map(|f| f.name()).collect();

        let mut map = ResultMap::new();
        map.insert("name".into(), json!(info.name));
        map.insert("version".into(), json!(info.version));
        map.insert("author".into(), json!(info.author));
        map.insert("description".into(), json!(info.description));
        map.insert("supported_formats".into(), json!(formats));
        map.insert("high_quality_bytes".into(), json!(self.high_quality_bytes));
        map.insert("medium_quality_bytes".into(), json!(self.medium_quality_bytes));
        map
    }

    fn operations(&self) -> Vec<Operation> {
        vec![
            Operation::analyze("analyze_format", ANALYSIS_NAMESPACE),
            Operation::analyze("analyze_quality", QUALITY_NAMESPACE),
            Operation::detect("detect_features", FEATURES_NAMESPACE),
        ]
    }

    async fn run(&self, operation: &Operation, ctx: &ExtractionContext) -> PluginResult<ResultMap> {
        let Some(format) = Self::format(ctx) else {
            let mut map = ResultMap::new();
            map.insert("supported".into(), json!(false));
            return Ok(map);
        };

        match operation.name.as_str() {
            "analyze_format" => Ok(Self::analyze_format(format)),
            "analyze_quality" => Ok(self.analyze_quality(format, Self::size(ctx))),
            "detect_features" => Ok(Self::detect_features(format)),
            other => Err(PluginError::fatal(&format!("unknown operation '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::interface::PluginOutput;
    use std::collections::BTreeMap;

    fn context(path: &str, size: u64, format: Option<&str>) -> ExtractionContext {
        let mut prior = BTreeMap::new();

        let mut file = ResultMap::new();
        file.insert("size_bytes".into(), json!(size));
        let mut base = PluginOutput::new();
        base.insert(base_metadata::NAMESPACE.to_string(), file);
        prior.insert(base_metadata::NAME.to_string(), base);

        let mut info = ResultMap::new();
        info.insert("is_image".into(), json!(format.is_some()));
        if let Some(format) = format {
            info.insert("format".into(), json!(format));
        }
        let mut image_output = PluginOutput::new();
        image_output.insert(image::NAMESPACE.to_string(), info);
        prior.insert(image::NAME.to_string(), image_output);

        ExtractionContext::new(path, size).with_prior_results(prior)
    }

    async fn run(plugin: &ImageAnalysisPlugin, op: &str, ctx: &ExtractionContext) -> ResultMap {
        let operation = plugin
            .operations()
            .into_iter()
            .find(|o| o.name == op)
            .unwrap();
        plugin.run(&operation, ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_format_analysis() {
        let plugin = ImageAnalysisPlugin::new();
        let ctx = context("a.png", 1000, Some("PNG"));

        let map = run(&plugin, "analyze_format", &ctx).await;
        assert_eq!(map["color_space"], json!("RGB/RGBA"));
        assert_eq!(map["compression"], json!("lossless"));
        assert_eq!(map["supports_transparency"], json!(true));
        assert_eq!(map["analysis_method"], json!("heuristic"));
    }

    #[tokio::test]
    async fn test_quality_uses_size_thresholds() {
        let plugin = ImageAnalysisPlugin::new();

        let big = context("a.jpg", 2 * 1024 * 1024, Some("JPEG"));
        let map = run(&plugin, "analyze_quality", &big).await;
        assert_eq!(map["estimated_quality"], json!("high"));
        assert_eq!(map["size_category"], json!("large"));

        let small = context("a.jpg", 10 * 1024, Some("JPEG"));
        let map = run(&plugin, "analyze_quality", &small).await;
        assert_eq!(map["estimated_quality"], json!("low"));
        assert_eq!(map["size_category"], json!("small"));

        let png = context("a.png", 10 * 1024, Some("PNG"));
        let map = run(&plugin, "analyze_quality", &png).await;
        assert_eq!(map["estimated_quality"], json!("lossless"));
    }

    #[tokio::test]
    async fn test_feature_detection() {
        let plugin = ImageAnalysisPlugin::new();
        let ctx = context("a.gif", 500, Some("GIF"));

        let map = run(&plugin, "detect_features", &ctx).await;
        assert_eq!(map["may_be_animated"], json!(true));
        assert_eq!(map["likely_photograph"], json!(false));
    }

    #[tokio::test]
    async fn test_non_image_is_unsupported() {
        let plugin = ImageAnalysisPlugin::new();
        let ctx = context("a.mp4", 500, None);

        let map = run(&plugin, "analyze_format", &ctx).await;
        assert_eq!(map["supported"], json!(false));
    }

    #[test]
    fn test_factory_reads_settings() {
        let mut ctx = PluginContext::default();
        ctx.set_config("high_quality_bytes", json!(5000));
        ctx.set_config("medium_quality_bytes", json!(1000));

        let plugin = ImageAnalysisPlugin::factory(&ctx).unwrap();
        let metadata = plugin.metadata();
        assert_eq!(metadata["high_quality_bytes"], json!(5000));
        assert_eq!(metadata["supported_formats"].as_array().unwrap().len(), 8);
    }

    #[test]
    fn test_factory_rejects_inverted_thresholds() {
        let mut ctx = PluginContext::default();
        ctx.set_config("high_quality_bytes", json!(10));
        ctx.set_config("medium_quality_bytes", json!(10));

        assert!(ImageAnalysisPlugin::factory(&ctx).is_err());
    }

    #[test]
    fn test_declared_namespaces() {
        let descriptor =
            crate::plugin::interface::PluginDescriptor::from_plugin(&ImageAnalysisPlugin::new());
        assert_eq!(
            descriptor.namespaces(),
            vec!["image_analysis", "image_quality", "image_features"]
        );
        assert_eq!(descriptor.dependencies, vec!["base_metadata", "image"]);
    }
}
