//! Dependency-aware plugin loader.
//!
//! Turns discovered candidates into an immutable [`ExecutionPlan`]:
//! - Duplicate module and namespace detection
//! - Missing dependency detection with propagated exclusion
//! - Cycle detection with the cycle path reported
//! - Topological ordering into stages (Kahn's algorithm by levels)

use crate::core::{now, LoadError, Timestamp};
use crate::plugin::discovery::Discovery;
use crate::plugin::interface::{Plugin, PluginDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// A plugin offered to the loader together with where it came from.
#[derive(Clone)]
pub struct PluginCandidate {
    /// Manifest path (or another label for in-process plugins)
    pub origin: PathBuf,
    /// Plugin instance
    pub plugin: Arc<dyn Plugin>,
}

impl PluginCandidate {
    /// Create a new candidate.
    pub fn new(origin: impl Into<PathBuf>, plugin: Arc<dyn Plugin>) -> Self {
        Self {
            origin: origin.into(),
            plugin,
        }
    }
}

/// A plugin accepted into a plan.
pub struct LoadedPlugin {
    /// Descriptor read at load time
    pub descriptor: PluginDescriptor,
    /// Manifest path
    pub origin: PathBuf,
    /// Plugin instance
    pub plugin: Arc<dyn Plugin>,
}

impl LoadedPlugin {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("descriptor", &self.descriptor)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Dependency-respecting order of plugins.
///
/// Stage `k` holds the plugins whose longest dependency chain has length
/// `k`, ordered by name. Every dependency of a plugin lives in an earlier
/// stage.
#[derive(Debug)]
pub struct ExecutionPlan {
    stages: Vec<Vec<Arc<LoadedPlugin>>>,
    created_at: Timestamp,
}

impl ExecutionPlan {
    /// A plan with nothing to run.
    pub fn empty() -> Self {
        Self {
            stages: Vec::new(),
            created_at: now(),
        }
    }

    pub fn stages(&self) -> &[Vec<Arc<LoadedPlugin>>] {
        &self.stages
    }

    /// All plugins in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LoadedPlugin>> {
        self.stages.iter().flatten()
    }

    /// Plugin names in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.iter().map(|p| p.name()).collect()
    }

    /// Index of a plugin in execution order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.iter().position(|p| p.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<LoadedPlugin>> {
        self.iter().find(|p| p.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

/// What happened during one load cycle.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoadReport {
    /// Loaded modules in execution order
    pub loaded: Vec<String>,
    /// Excluded modules (or manifest paths) and why
    pub skipped: BTreeMap<String, LoadError>,
    /// When the report was produced
    pub generated_at: Option<Timestamp>,
}

impl LoadReport {
    /// True when nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn reason(&self, module: &str) -> Option<&LoadError> {
        self.skipped.get(module)
    }
}

/// Result of [`resolve`].
#[derive(Debug)]
pub struct LoadOutcome {
    pub plan: ExecutionPlan,
    pub report: LoadReport,
}

/// Validate the discovered plugins and order them.
pub fn resolve(discovery: Discovery) -> LoadOutcome {
    let Discovery {
        candidates,
        rejected,
    } = discovery;
    let mut skipped = rejected;

    // Group by name so duplicates are visible together
    let mut by_name: BTreeMap<String, Vec<(PluginDescriptor, PluginCandidate)>> = BTreeMap::new();
    for candidate in candidates {
        let descriptor = PluginDescriptor::from_plugin(candidate.plugin.as_ref());
        by_name
            .entry(descriptor.name.clone())
            .or_default()
            .push((descriptor, candidate));
    }
    let known: BTreeSet<String> = by_name.keys().cloned().collect();

    let mut nodes: BTreeMap<String, LoadedPlugin> = BTreeMap::new();
    for (name, entries) in by_name {
        if entries.len() > 1 {
            let origins = entries.iter().map(|(_, c)| c.origin.clone()).collect();
            skipped.insert(name.clone(), LoadError::DuplicateModule { name, origins });
            continue;
        }
        if let Some((descriptor, candidate)) = entries.into_iter().next() {
            nodes.insert(
                name,
                LoadedPlugin {
                    descriptor,
                    origin: candidate.origin,
                    plugin: candidate.plugin,
                },
            );
        }
    }

    reject_namespace_conflicts(&mut nodes, &mut skipped);

    let missing: Vec<(String, String)> = nodes
        .iter()
        .filter_map(|(name, node)| {
            node.descriptor
                .dependencies
                .iter()
                .find(|dep| !known.contains(*dep))
                .map(|dep| (name.clone(), dep.clone()))
        })
        .collect();
    for (name, dependency) in missing {
        nodes.remove(&name);
        skipped.insert(name, LoadError::MissingDependency { dependency });
    }

    propagate_failures(&mut nodes, &mut skipped);

    let (stages, remaining) = levels(&nodes);
    if !remaining.is_empty() {
        let cycles: Vec<(String, Vec<String>)> = remaining
            .iter()
            .filter_map(|name| cycle_through(name, &nodes, &remaining).map(|c| (name.clone(), c)))
            .collect();
        for (name, cycle) in cycles {
            nodes.remove(&name);
            skipped.insert(name, LoadError::DependencyCycle { cycle });
        }
        propagate_failures(&mut nodes, &mut skipped);
    }

    let stages: Vec<Vec<Arc<LoadedPlugin>>> = stages
        .into_iter()
        .map(|stage| {
            stage
                .iter()
                .filter_map(|name| nodes.remove(name))
                .map(Arc::new)
                .collect::<Vec<_>>()
        })
        .filter(|stage| !stage.is_empty())
        .collect();

    let plan = ExecutionPlan {
        stages,
        created_at: now(),
    };

    for (index, stage) in plan.stages().iter().enumerate() {
        for loaded in stage {
            info!(
                module = %loaded.name(),
                version = %loaded.descriptor.version,
                stage = index,
                origin = %loaded.origin.display(),
                "Plugin loaded"
            );
        }
    }
    for (module, reason) in &skipped {
        warn!(module = %module, reason = %reason, "Plugin skipped");
    }

    let report = LoadReport {
        loaded: plan.order().into_iter().map(String::from).collect(),
        skipped,
        generated_at: Some(plan.created_at()),
    };

    LoadOutcome { plan, report }
}

/// Reject every plugin that shares a namespace with another (or with itself).
fn reject_namespace_conflicts(
    nodes: &mut BTreeMap<String, LoadedPlugin>,
    skipped: &mut BTreeMap<String, LoadError>,
) {
    let mut owners: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, node) in nodes.iter() {
        for namespace in node.descriptor.namespaces() {
            owners
                .entry(namespace.to_string())
                .or_default()
                .push(name.clone());
        }
    }

    for (namespace, mut plugins) in owners {
        if plugins.len() < 2 {
            continue;
        }
        plugins.dedup();
        for plugin in &plugins {
            nodes.remove(plugin);
            skipped
                .entry(plugin.clone())
                .or_insert_with(|| LoadError::NamespaceConflict {
                    namespace: namespace.clone(),
                    plugins: plugins.clone(),
                });
        }
    }
}

/// Drop every node with a dependency that is no longer present, until stable.
fn propagate_failures(
    nodes: &mut BTreeMap<String, LoadedPlugin>,
    skipped: &mut BTreeMap<String, LoadError>,
) {
    loop {
        let failed: Vec<(String, String)> = nodes
            .iter()
            .filter_map(|(name, node)| {
                node.descriptor
                    .dependencies
                    .iter()
                    .find(|dep| !nodes.contains_key(*dep))
                    .map(|dep| (name.clone(), dep.clone()))
            })
            .collect();

        if failed.is_empty() {
            return;
        }

        for (name, dependency) in failed {
            nodes.remove(&name);
            skipped.insert(name, LoadError::DependencyFailed { dependency });
        }
    }
}

/// Kahn's algorithm, emitting one stage per level.
///
/// Returns the stages and the nodes that could not be ordered.
fn levels(nodes: &BTreeMap<String, LoadedPlugin>) -> (Vec<Vec<String>>, BTreeSet<String>) {
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::with_capacity(nodes.len());

    for (name, node) in nodes {
        in_degree.insert(name, node.descriptor.dependencies.len());
        for dep in &node.descriptor.dependencies {
            dependents.entry(dep.as_str()).or_default().push(name);
        }
    }

    let mut current: Vec<&str> = nodes
        .keys()
        .map(String::as_str)
        .filter(|name| in_degree.get(name) == Some(&0))
        .collect();
    let mut stages = Vec::new();
    let mut placed: BTreeSet<String> = BTreeSet::new();

    while !current.is_empty() {
        current.sort_unstable();
        let mut next = Vec::new();

        for name in &current {
            placed.insert(name.to_string());
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*dependent);
                    }
                }
            }
        }

        stages.push(current.iter().map(|s| s.to_string()).collect());
        current = next;
    }

    let remaining = nodes
        .keys()
        .filter(|name| !placed.contains(*name))
        .cloned()
        .collect();

    (stages, remaining)
}

/// Dependencies of `name` that are inside `scope`.
fn scoped_dependencies<'a>(
    name: &str,
    nodes: &'a BTreeMap<String, LoadedPlugin>,
    scope: &BTreeSet<String>,
) -> Vec<&'a str> {
    nodes
        .get(name)
        .map(|node| {
            node.descriptor
                .dependencies
                .iter()
                .map(String::as_str)
                .filter(|dep| scope.contains(*dep))
                .collect()
        })
        .unwrap_or_default()
}

/// Shortest dependency path from `start` back to itself, within `scope`.
fn cycle_through(
    start: &str,
    nodes: &BTreeMap<String, LoadedPlugin>,
    scope: &BTreeSet<String>,
) -> Option<Vec<String>> {
    let mut parent: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);

    while let Some(current) = queue.pop_front() {
        for dep in scoped_dependencies(current, nodes, scope) {
            if dep == start {
                let mut path = vec![current.to_string()];
                let mut cursor = current;
                while let Some(&up) = parent.get(cursor) {
                    path.push(up.to_string());
                    cursor = up;
                }
                path.reverse();
                path.push(start.to_string());
                return Some(path);
            }
            if !parent.contains_key(dep) {
                parent.insert(dep, current);
                queue.push_back(dep);
            }
        }
    }

    None
}
