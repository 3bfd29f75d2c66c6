//! Configurable plugin used by the unit tests.

use crate::core::ResultMap;
use crate::plugin::interface::{
    ExtractionContext, Operation, Plugin, PluginError, PluginInfo, PluginResult,
};
use crate::plugin::loader::PluginCandidate;
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub(crate) enum Behavior {
    Succeed,
    Fail(String),
    Sleep(Duration),
    Panic,
}

pub(crate) struct MockPlugin {
    name: String,
    dependencies: Vec<String>,
    operations: Vec<Operation>,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    completions: Arc<AtomicUsize>,
}

impl MockPlugin {
    /// One `extract_<name>` operation writing the `<name>` namespace.
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dependencies: Vec::new(),
            operations: vec![Operation::extract(&format!("extract_{}", name), name)],
            behavior: Behavior::Succeed,
            calls: Arc::new(AtomicUsize::new(0)),
            completions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn depends_on(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub(crate) fn namespaces(mut self, namespaces: &[&str]) -> Self {
        self.operations = namespaces
            .iter()
            .map(|ns| Operation::analyze(&format!("analyze_{}", ns), ns))
            .collect();
        self
    }

    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.behavior = Behavior::Fail(message.to_string());
        self
    }

    pub(crate) fn sleeping(mut self, duration: Duration) -> Self {
        self.behavior = Behavior::Sleep(duration);
        self
    }

    pub(crate) fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    /// Runs that got past their behavior and produced output.
    pub(crate) fn completions(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.completions)
    }

    pub(crate) fn candidate(self) -> PluginCandidate {
        let origin = format!("tests/{}.json", self.name);
        PluginCandidate::new(origin, Arc::new(self))
    }
}

#[async_trait]
impl Plugin for MockPlugin {
    fn info(&self) -> PluginInfo {
        let mut info = PluginInfo::new(&self.name, "0.1.0");
        info.dependencies = self.dependencies.clone();
        info
    }

    fn operations(&self) -> Vec<Operation> {
        self.operations.clone()
    }

    async fn run(&self, operation: &Operation, ctx: &ExtractionContext) -> PluginResult<ResultMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail(message) => return Err(PluginError::new(message)),
            Behavior::Sleep(duration) => tokio::time::sleep(*duration).await,
            Behavior::Panic => panic!("mock plugin {} panicked", self.name),
        }

        self.completions.fetch_add(1, Ordering::SeqCst);

        let seen: Vec<&String> = ctx.prior_results().keys().collect();
        let mut map = ResultMap::new();
        map.insert("plugin".into(), json!(self.name));
        map.insert("operation".into(), json!(operation.name));
        map.insert("seen".into(), json!(seen));
        Ok(map)
    }
}
