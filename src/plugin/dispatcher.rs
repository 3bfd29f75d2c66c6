//! Extraction function dispatcher.
//!
//! Runs an [`ExecutionPlan`] stage by stage. Plugins inside a stage run
//! concurrently up to the configured bound; a stage starts only after the
//! previous one has fully settled.
//!
//! A plugin whose dependency failed, was skipped or was cancelled never
//! starts and is recorded as [`ExecutionError::DependencyUnavailable`].
//!
//! Dropping the future returned by [`Dispatcher::dispatch`] aborts the
//! plugins still in flight.

use crate::core::ExecutionError;
use crate::plugin::config::PluginConfig;
use crate::plugin::interface::{ExtractionContext, PluginOutput};
use crate::plugin::loader::{ExecutionPlan, LoadedPlugin};
use futures::FutureExt;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Per-plugin outcome of one run.
#[derive(Clone, Debug, Default)]
pub struct DispatchOutcome {
    /// Successful plugins and their outputs
    pub outputs: BTreeMap<String, PluginOutput>,
    /// Failed, skipped and cancelled plugins
    pub failures: BTreeMap<String, ExecutionError>,
}

/// Runs plans with bounded parallelism and per-plugin timeouts.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    timeout: Duration,
    max_concurrency: usize,
}

impl Dispatcher {
    /// Create a new dispatcher.
    pub fn new(timeout: Duration, max_concurrency: usize) -> Self {
        Self {
            timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(config.timeout(), config.max_concurrency)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run every plugin of the plan against `base`.
    ///
    /// Each stage sees `base` plus the outputs of all plugins that succeeded
    /// in earlier stages.
    pub async fn dispatch(
        &self,
        plan: &ExecutionPlan,
        base: &ExtractionContext,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut outcome = DispatchOutcome::default();
        let mut prior = base.prior_results().clone();

        for (index, stage) in plan.stages().iter().enumerate() {
            if cancel.is_cancelled() {
                for loaded in stage {
                    outcome
                        .failures
                        .insert(loaded.name().to_string(), ExecutionError::Cancelled);
                }
                continue;
            }

            let context = Arc::new(base.with_prior_results(prior.clone()));
            // Dropping the set aborts every task still running
            let mut tasks = JoinSet::new();
            let mut pending = BTreeSet::new();

            for loaded in stage {
                let unavailable = loaded
                    .descriptor
                    .dependencies
                    .iter()
                    .find(|dep| outcome.failures.contains_key(*dep));
                if let Some(dep) = unavailable {
                    debug!(plugin = %loaded.name(), dependency = %dep, "Skipping plugin");
                    outcome.failures.insert(
                        loaded.name().to_string(),
                        ExecutionError::DependencyUnavailable(dep.clone()),
                    );
                    continue;
                }

                let name = loaded.name().to_string();
                let task = run_guarded(
                    Arc::clone(loaded),
                    Arc::clone(&context),
                    Arc::clone(&semaphore),
                    cancel.clone(),
                    self.timeout,
                );
                pending.insert(name.clone());
                tasks.spawn(async move { (name, task.await) });
            }

            debug!(stage = index, tasks = tasks.len(), "Stage started");

            let mut lost = None;
            while let Some(joined) = tasks.join_next().await {
                let (name, result) = match joined {
                    Ok(joined) => joined,
                    Err(e) => {
                        lost = Some(e.to_string());
                        continue;
                    }
                };
                pending.remove(&name);

                match result {
                    Ok(output) => {
                        outcome.outputs.insert(name.clone(), output.clone());
                        prior.insert(name, output);
                    }
                    Err(error) => {
                        warn!(plugin = %name, error = %error, "Plugin failed");
                        outcome.failures.insert(name, error);
                    }
                }
            }

            // Tasks that died outside the panic guard never report their name
            for name in pending {
                let reason = lost.clone().unwrap_or_else(|| "task lost".to_string());
                warn!(plugin = %name, error = %reason, "Plugin task aborted");
                outcome
                    .failures
                    .insert(name, ExecutionError::Panicked(reason));
            }
        }

        outcome
    }
}

/// Wait for a permit, then run the plugin under the timeout.
async fn run_guarded(
    loaded: Arc<LoadedPlugin>,
    context: Arc<ExtractionContext>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    timeout: Duration,
) -> Result<PluginOutput, ExecutionError> {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ExecutionError::Cancelled),
        permit = semaphore.acquire_owned() => permit.map_err(|_| ExecutionError::Cancelled)?,
    };

    let started = Instant::now();
    let invocation = AssertUnwindSafe(invoke(&loaded, &context)).catch_unwind();

    let result = match tokio::time::timeout(timeout, invocation).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(ExecutionError::Panicked(panic_message(panic.as_ref()))),
        Err(_) => Err(ExecutionError::Timeout),
    };

    debug!(
        plugin = %loaded.name(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        ok = result.is_ok(),
        "Plugin finished"
    );
    result
}

/// Run all operations of one plugin; the output is kept only if all succeed.
async fn invoke(
    loaded: &LoadedPlugin,
    context: &ExtractionContext,
) -> Result<PluginOutput, ExecutionError> {
    let mut output = PluginOutput::new();

    for operation in &loaded.descriptor.operations {
        let map = loaded
            .plugin
            .run(operation, context)
            .await
            .map_err(|e| ExecutionError::Failed(format!("{}: {}", operation.name, e.message)))?;
        output.insert(operation.namespace.clone(), map);
    }

    Ok(output)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
