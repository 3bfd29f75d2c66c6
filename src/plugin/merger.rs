//! Result merger.
//!
//! Folds per-plugin outputs into one namespaced [`ResultDocument`].

use crate::core::{Error, Hash256, Result, ResultMap};
use crate::plugin::interface::PluginOutput;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Combined extraction result, keyed by namespace.
///
/// Keys are kept sorted, so equal documents serialize to equal bytes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultDocument {
    namespaces: BTreeMap<String, ResultMap>,
}

impl ResultDocument {
    /// Result stored under a namespace.
    pub fn get(&self, namespace: &str) -> Option<&ResultMap> {
        self.namespaces.get(namespace)
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Namespace keys, sorted.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Serialize to compact JSON.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// SHA3-256 of the compact JSON form.
    pub fn fingerprint(&self) -> Result<Hash256> {
        Ok(Hash256::digest(&self.to_json_bytes()?))
    }
}

/// Merge plugin outputs into a document.
///
/// Fails if two plugins wrote the same namespace; nothing is overwritten.
pub fn merge(outputs: &BTreeMap<String, PluginOutput>) -> Result<ResultDocument> {
    let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
    let mut document = ResultDocument::default();

    for (plugin, output) in outputs {
        for (namespace, result) in output {
            if let Some(first) = owners.get(namespace.as_str()) {
                return Err(Error::MergeConflict {
                    namespace: namespace.clone(),
                    first: first.to_string(),
                    second: plugin.clone(),
                });
            }
            owners.insert(namespace, plugin);
            document.namespaces.insert(namespace.clone(), result.clone());
        }
    }

    Ok(document)
}
