//! Plugin host.
//!
//! Owns the configuration, the catalog and the current execution plan.
//! `reload` swaps in a freshly computed plan; runs already in flight keep
//! the plan they started with. Reloads are serialized, and the plan and its
//! load report are swapped together.

use crate::core::{now, Error, Result};
use crate::monitoring::metrics::{ExtractionMetrics, MetricsSnapshot};
use crate::plugin::config::PluginConfig;
use crate::plugin::discovery::{discover, PluginCatalog};
use crate::plugin::dispatcher::Dispatcher;
use crate::plugin::interface::{ExtractionContext, PluginOutput};
use crate::plugin::loader::{resolve, ExecutionPlan, LoadOutcome, LoadReport};
use crate::plugin::merger::{merge, ResultDocument};
use crate::plugin::report::{missing_namespaces, ExtractionReport};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// The current plan and the report that produced it.
struct LoadedState {
    plan: Arc<ExecutionPlan>,
    report: LoadReport,
}

/// Plugin host.
pub struct PluginHost {
    config: PluginConfig,
    catalog: PluginCatalog,
    dispatcher: Dispatcher,
    state: RwLock<LoadedState>,
    reloading: Mutex<()>,
    metrics: ExtractionMetrics,
}

impl PluginHost {
    /// Create a host with an empty plan; call [`reload`](Self::reload) to load plugins.
    pub fn new(config: PluginConfig, catalog: PluginCatalog) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            dispatcher: Dispatcher::from_config(&config),
            config,
            catalog,
            state: RwLock::new(LoadedState {
                plan: Arc::new(ExecutionPlan::empty()),
                report: LoadReport::default(),
            }),
            reloading: Mutex::new(()),
            metrics: ExtractionMetrics::new(),
        })
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Discover and resolve plugins, then swap in the new plan.
    pub async fn reload(&self) -> Result<LoadReport> {
        let _reloading = self.reloading.lock().await;
        let discovery = discover(&self.config, &self.catalog).await;
        let LoadOutcome { plan, report } = resolve(discovery);

        info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "Plugin plan reloaded"
        );

        *self
            .state
            .write()
            .map_err(|_| Error::Internal("plan lock poisoned".to_string()))? = LoadedState {
            plan: Arc::new(plan),
            report: report.clone(),
        };

        Ok(report)
    }

    /// The plan new runs will use.
    pub fn plan(&self) -> Result<Arc<ExecutionPlan>> {
        self.state
            .read()
            .map(|state| Arc::clone(&state.plan))
            .map_err(|_| Error::Internal("plan lock poisoned".to_string()))
    }

    /// Report of the latest reload.
    pub fn last_report(&self) -> Result<LoadReport> {
        self.state
            .read()
            .map(|state| state.report.clone())
            .map_err(|_| Error::Internal("plan lock poisoned".to_string()))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Extract metadata for a file on disk.
    pub async fn extract(&self, path: impl AsRef<Path>) -> Result<ExtractionReport> {
        let context = ExtractionContext::from_path(path).await?;
        self.extract_with(context, &CancellationToken::new()).await
    }

    /// Extract metadata for a caller-built context.
    ///
    /// Cancelling `cancel` prevents plugins that have not started from
    /// starting; the report is still returned.
    pub async fn extract_with(
        &self,
        context: ExtractionContext,
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport> {
        let plan = self.plan()?;
        let run_id = Uuid::new_v4();
        let started_at = now();

        info!(run_id = %run_id, file = %context.file_path().display(), plugins = plan.len(), "Extraction started");

        let outcome = self.dispatcher.dispatch(&plan, &context, cancel).await;
        let document = merge_outputs(&outcome.outputs)?;
        let fingerprint = document.fingerprint()?.to_hex();

        let report = ExtractionReport {
            run_id,
            file_path: context.file_path().to_path_buf(),
            missing: missing_namespaces(&plan, &outcome),
            document,
            failures: outcome.failures,
            fingerprint,
            started_at,
            finished_at: now(),
        };

        self.metrics.record(&report, outcome.outputs.len());
        info!(
            run_id = %run_id,
            namespaces = report.document.len(),
            failures = report.failures.len(),
            elapsed_ms = report.duration().num_milliseconds(),
            "Extraction finished"
        );

        Ok(report)
    }
}

/// Merge plugin outputs, logging a namespace conflict before returning it.
fn merge_outputs(outputs: &BTreeMap<String, PluginOutput>) -> Result<ResultDocument> {
    merge(outputs).map_err(|e| {
        if let Error::MergeConflict {
            namespace,
            first,
            second,
        } = &e
        {
            error!(
                namespace = %namespace,
                first = %first,
                second = %second,
                "Namespace produced by two plugins"
            );
        }
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ExecutionError, ResultMap};
    use crate::plugin::interface::Plugin;
    use crate::plugin::testing::MockPlugin;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn write_manifest(dir: &Path, file: &str, plugin: &str) {
        let body = serde_json::json!({ "plugin": plugin }).to_string();
        std::fs::write(dir.join(file), body).unwrap();
    }

    fn catalog() -> PluginCatalog {
        let mut catalog = PluginCatalog::new();
        catalog
            .register("A", |_| Ok(Arc::new(MockPlugin::new("A")) as Arc<dyn Plugin>))
            .register("B", |_| {
                Ok(Arc::new(MockPlugin::new("B").depends_on(&["A"])) as Arc<dyn Plugin>)
            })
            .register("C", |_| {
                Ok(Arc::new(MockPlugin::new("C").depends_on(&["A"])) as Arc<dyn Plugin>)
            })
            .register("G", |_| {
                Ok(Arc::new(
                    MockPlugin::new("G")
                        .namespaces(&["image_quality"])
                        .sleeping(Duration::from_secs(30)),
                ) as Arc<dyn Plugin>)
            });
        catalog
    }

    fn config(dir: &Path) -> PluginConfig {
        PluginConfig::enabled()
            .with_default_path(dir)
            .with_alternate_path(dir)
            .with_timeout(Duration::from_millis(100))
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = PluginConfig::enabled().with_max_concurrency(0);
        assert!(matches!(
            PluginHost::new(config, PluginCatalog::new()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_and_extract() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["A", "B", "C"] {
            write_manifest(dir.path(), &format!("{}.json", name), name);
        }

        let host = assert_ok!(PluginHost::new(config(dir.path()), catalog()));
        let report = host.reload().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(host.plan().unwrap().len(), 3);
        assert_eq!(host.last_report().unwrap().loaded, report.loaded);

        let run = host
            .extract_with(ExtractionContext::new("x.jpg", 10), &CancellationToken::new())
            .await
            .unwrap();
        assert!(run.is_complete());
        assert_eq!(run.document.namespaces().collect::<Vec<_>>(), vec!["A", "B", "C"]);
        assert_eq!(host.metrics().runs, 1);
        assert_eq!(host.metrics().plugins_succeeded, 3);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["A", "B", "C"] {
            write_manifest(dir.path(), &format!("{}.json", name), name);
        }
        let host = PluginHost::new(config(dir.path()), catalog()).unwrap();
        host.reload().await.unwrap();

        let ctx = ExtractionContext::new("x.jpg", 10);
        let first = host.extract_with(ctx.clone(), &CancellationToken::new()).await.unwrap();
        let second = host.extract_with(ctx, &CancellationToken::new()).await.unwrap();

        assert_eq!(
            first.document.to_json_bytes().unwrap(),
            second.document.to_json_bytes().unwrap()
        );
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_timeout_yields_partial_document() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["A", "B", "G"] {
            write_manifest(dir.path(), &format!("{}.json", name), name);
        }
        let host = PluginHost::new(config(dir.path()), catalog()).unwrap();
        host.reload().await.unwrap();

        let run = host
            .extract_with(ExtractionContext::new("x.jpg", 10), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!run.document.contains("image_quality"));
        assert!(run.document.contains("A"));
        assert!(run.document.contains("B"));
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures["G"].to_string(), "timeout");
        assert_eq!(run.missing.len(), 1);
        assert_eq!(run.missing[0].namespace, "image_quality");
        assert_eq!(run.missing[0].reason, ExecutionError::Timeout);
        assert_eq!(host.metrics().plugins_timed_out, 1);
    }

    #[tokio::test]
    async fn test_reload_swaps_plan_without_touching_held_one() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "A.json", "A");

        let host = PluginHost::new(config(dir.path()), catalog()).unwrap();
        host.reload().await.unwrap();
        let held = host.plan().unwrap();

        write_manifest(dir.path(), "B.json", "B");
        host.reload().await.unwrap();

        assert_eq!(held.order(), vec!["A"]);
        assert_eq!(host.plan().unwrap().order(), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_disabled_host_has_empty_plan() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "A.json", "A");

        let config = config(dir.path()).with_enabled(false);
        let host = PluginHost::new(config, catalog()).unwrap();
        let report = host.reload().await.unwrap();

        assert!(report.loaded.is_empty());
        let run = host
            .extract_with(ExtractionContext::new("x.jpg", 10), &CancellationToken::new())
            .await
            .unwrap();
        assert!(run.document.is_empty());
        assert!(run.is_complete());
    }

    #[tokio::test]
    async fn test_extract_missing_file_is_io_error() {
        let host = PluginHost::new(PluginConfig::enabled(), PluginCatalog::new()).unwrap();
        let result = host.extract(PathBuf::from("/definitely/not/here.jpg")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_concurrent_reloads_keep_plan_and_report_together() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "A.json", "A");
        let host = PluginHost::new(config(dir.path()), catalog()).unwrap();

        let writer = async {
            tokio::task::yield_now().await;
            write_manifest(dir.path(), "B.json", "B");
        };
        let (first, second, _) = tokio::join!(host.reload(), host.reload(), writer);
        assert_ok!(first);
        assert_ok!(second);

        let plan = host.plan().unwrap();
        let report = host.last_report().unwrap();
        assert_eq!(plan.order(), report.loaded);
        assert_eq!(plan.created_at(), report.generated_at.unwrap());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_merge_conflict_is_logged_and_returned() {
        let mut outputs = BTreeMap::new();
        for plugin in ["exif_reader", "xmp_reader"] {
            let mut output = PluginOutput::new();
            output.insert("camera".to_string(), ResultMap::new());
            outputs.insert(plugin.to_string(), output);
        }

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || merge_outputs(&outputs));

        assert!(matches!(
            result,
            Err(Error::MergeConflict { ref namespace, .. }) if namespace == "camera"
        ));
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("ERROR"));
        assert!(text.contains("camera"));
        assert!(text.contains("exif_reader"));
        assert!(text.contains("xmp_reader"));
    }
}
