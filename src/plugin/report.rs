//! Outcome of one extraction run.

use crate::core::{ExecutionError, Timestamp};
use crate::plugin::dispatcher::DispatchOutcome;
use crate::plugin::loader::ExecutionPlan;
use crate::plugin::merger::ResultDocument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

/// A namespace absent from the document, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingNamespace {
    pub namespace: String,
    pub plugin: String,
    pub reason: ExecutionError,
}

/// Everything the caller gets back from an extraction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Run identifier
    pub run_id: Uuid,
    /// Input file
    pub file_path: PathBuf,
    /// Merged results; partial when plugins failed
    pub document: ResultDocument,
    /// Per-plugin failures
    pub failures: BTreeMap<String, ExecutionError>,
    /// Namespaces the plan promised but the run did not produce
    pub missing: Vec<MissingNamespace>,
    /// SHA3-256 of the serialized document, hex encoded
    pub fingerprint: String,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl ExtractionReport {
    /// True when every planned plugin succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Wall-clock time of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Namespaces of failed plugins, in plan order.
pub fn missing_namespaces(plan: &ExecutionPlan, outcome: &DispatchOutcome) -> Vec<MissingNamespace> {
    plan.iter()
        .filter_map(|loaded| {
            outcome
                .failures
                .get(loaded.name())
                .map(|reason| (loaded, reason))
        })
        .flat_map(|(loaded, reason)| {
            loaded
                .descriptor
                .operations
                .iter()
                .map(move |op| MissingNamespace {
                    namespace: op.namespace.clone(),
                    plugin: loaded.name().to_string(),
                    reason: reason.clone(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::discovery::Discovery;
    use crate::plugin::loader::resolve;
    use crate::plugin::testing::MockPlugin;

    #[test]
    fn test_missing_namespaces_follow_plan_order() {
        let outcome = resolve(Discovery::from_candidates(vec![
            MockPlugin::new("A").candidate(),
            MockPlugin::new("G")
                .depends_on(&["A"])
                .namespaces(&["image_quality", "image_features"])
                .candidate(),
        ]));

        let mut dispatched = DispatchOutcome::default();
        dispatched
            .failures
            .insert("G".to_string(), ExecutionError::Timeout);

        let missing = missing_namespaces(&outcome.plan, &dispatched);
        assert_eq!(
            missing,
            vec![
                MissingNamespace {
                    namespace: "image_quality".into(),
                    plugin: "G".into(),
                    reason: ExecutionError::Timeout,
                },
                MissingNamespace {
                    namespace: "image_features".into(),
                    plugin: "G".into(),
                    reason: ExecutionError::Timeout,
                },
            ]
        );
    }
}
