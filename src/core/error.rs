//! Error types for MetaExtract.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for MetaExtract operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in MetaExtract operations.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Merge errors
    #[error("Namespace '{namespace}' written by both '{first}' and '{second}'")]
    MergeConflict {
        namespace: String,
        first: String,
        second: String,
    },

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

/// Reasons a plugin module is excluded from the execution plan.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadError {
    #[error("module '{name}' discovered more than once: {}", display_paths(.origins))]
    DuplicateModule { name: String, origins: Vec<PathBuf> },

    #[error("depends on unknown module '{dependency}'")]
    MissingDependency { dependency: String },

    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("dependency '{dependency}' failed to load")]
    DependencyFailed { dependency: String },

    #[error("namespace '{namespace}' claimed by {}", .plugins.join(", "))]
    NamespaceConflict {
        namespace: String,
        plugins: Vec<String>,
    },

    #[error("invalid manifest {}: {reason}", .path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("manifest {} names unknown implementation '{implementation}'", .path.display())]
    UnknownImplementation {
        path: PathBuf,
        implementation: String,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-run failure of a single plugin.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("{0}")]
    Failed(String),

    #[error("timeout")]
    Timeout,

    #[error("panicked: {0}")]
    Panicked(String),

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        assert_eq!(ExecutionError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_cycle_display() {
        let err = LoadError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn test_namespace_conflict_names_everyone() {
        let err = LoadError::NamespaceConflict {
            namespace: "image_quality".into(),
            plugins: vec!["E".into(), "F".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("image_quality"));
        assert!(msg.contains('E'));
        assert!(msg.contains('F'));
    }

    #[test]
    fn test_duplicate_lists_paths() {
        let err = LoadError::DuplicateModule {
            name: "image".into(),
            origins: vec![PathBuf::from("a/image.json"), PathBuf::from("b/image.json")],
        };
        let msg = err.to_string();
        assert!(msg.contains("a/image.json"));
        assert!(msg.contains("b/image.json"));
    }

    #[test]
    fn test_execution_error_serialization() {
        let json = serde_json::to_value(ExecutionError::Timeout).unwrap();
        assert_eq!(json["kind"], "timeout");
    }
}
