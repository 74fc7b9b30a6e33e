// src/resolver/plan.rs

//! Build plan emission
//!
//! Turns a resolved, configured graph into an ordered list of packages:
//! dependencies always come before their dependents, and among packages
//! that are ready at the same time the smallest name goes first. Identical
//! inputs therefore always produce identical plans.

use super::graph::DependencyGraph;
use super::lockfile::{LOCKFILE_NAME, Lockfile};
use crate::error::{Error, Result};
use crate::hash::Hasher;
use crate::recipe::PackageId;
use crate::source::ArtifactRequest;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// File name of the JSON plan
pub const JSON_PLAN_NAME: &str = "kiln.json";

/// One fully configured package in the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPackage {
    pub name: String,
    pub version: String,
    /// Hash of the package's complete configuration
    pub package_id: String,
    pub options: BTreeMap<String, String>,
    pub settings: BTreeMap<String, String>,
    /// Direct dependencies as `name/version`
    pub requires: Vec<String>,
}

impl PlannedPackage {
    pub fn id(&self) -> PackageId {
        PackageId::new(self.name.clone(), self.version.clone())
    }

    /// Key for looking up a prebuilt binary of this exact configuration
    pub fn artifact_request(&self) -> ArtifactRequest {
        ArtifactRequest {
            package: self.id(),
            package_id: self.package_id.clone(),
            options: self.options.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// The ordered, reproducible result of a resolution run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub root: PackageId,
    pub settings: BTreeMap<String, String>,
    pub generators: Vec<String>,
    pub packages: Vec<PlannedPackage>,
}

impl BuildPlan {
    pub fn package(&self, name: &str) -> Option<&PlannedPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Transitive dependencies of `name`, dependents before dependencies
    ///
    /// This is the order a static linker wants its libraries in.
    pub fn link_order(&self, name: &str) -> Option<Vec<&str>> {
        let position: BTreeMap<&str, usize> = self
            .packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.as_str(), i))
            .collect();
        let start = self.package(name)?;

        let mut needed = BTreeSet::new();
        let mut stack: Vec<&PlannedPackage> = vec![start];
        while let Some(package) = stack.pop() {
            for dep in &package.requires {
                let dep_name = dep.split_once('/').map_or(dep.as_str(), |(n, _)| n);
                if let Some(&i) = position.get(dep_name)
                    && needed.insert(i)
                {
                    stack.push(&self.packages[i]);
                }
            }
        }

        Some(
            needed
                .into_iter()
                .rev()
                .map(|i| self.packages[i].name.as_str())
                .collect(),
        )
    }

    /// Canonical JSON form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization {
            what: "build plan".to_string(),
            reason: e.to_string(),
        })
    }

    /// SHA-256 over the compact canonical JSON
    pub fn plan_hash(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self).map_err(|e| Error::Serialization {
            what: "build plan".to_string(),
            reason: e.to_string(),
        })?;
        Ok(crate::hash::sha256(&bytes))
    }

    /// Lookup keys for prebuilt binaries, in plan order
    pub fn artifact_requests(&self) -> Vec<ArtifactRequest> {
        self.packages
            .iter()
            .map(PlannedPackage::artifact_request)
            .collect()
    }

    /// Generators to run: the root's own plus the lockfile, which is always written
    pub fn output_generators(&self) -> Vec<Generator> {
        let mut generators = vec![Generator::Lockfile];
        for name in &self.generators {
            let generator = Generator::from_name(name);
            if !generators.contains(&generator) {
                generators.push(generator);
            }
        }
        generators
    }

    /// Render one output file; `None` for generators handled downstream
    pub fn render(&self, generator: &Generator) -> Result<Option<(&'static str, String)>> {
        match generator {
            Generator::Lockfile => {
                let lockfile = Lockfile::from_plan(self)?;
                let content = lockfile.to_toml().map_err(|e| Error::Serialization {
                    what: "lockfile".to_string(),
                    reason: e.to_string(),
                })?;
                Ok(Some((LOCKFILE_NAME, content)))
            }
            Generator::Json => Ok(Some((JSON_PLAN_NAME, self.to_json()?))),
            Generator::External(_) => Ok(None),
        }
    }
}

/// An output format named in a recipe's `generators`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generator {
    Lockfile,
    Json,
    /// Carried through for downstream tooling (e.g. `cmake_find_package`)
    External(String),
}

impl Generator {
    pub fn from_name(name: &str) -> Self {
        match name {
            "lockfile" => Self::Lockfile,
            "json" => Self::Json,
            other => Self::External(other.to_string()),
        }
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lockfile => f.write_str("lockfile"),
            Self::Json => f.write_str("json"),
            Self::External(name) => f.write_str(name),
        }
    }
}

/// Emit the build plan for a resolved graph
pub fn emit(graph: &DependencyGraph) -> Result<BuildPlan> {
    let root = graph
        .root_node()
        .ok_or_else(|| Error::IncompleteGraph {
            package: graph.root().to_string(),
            reason: "root node missing".to_string(),
        })?;

    check_complete(graph)?;

    // Kahn's algorithm: a package is ready once all its children are emitted
    let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in graph.nodes() {
        let children = node.children();
        pending.insert(node.name(), children.len());
        for child in children {
            dependents.entry(child.name.as_str()).or_default().push(node.name());
        }
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&name, _)| name)
        .collect();
    let mut order: Vec<&str> = Vec::with_capacity(graph.len());

    while let Some(name) = ready.pop_first() {
        order.push(name);
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(count) = pending.get_mut(dependent) {
                *count -= 1;
                if *count == 0 {
                    ready.insert(*dependent);
                }
            }
        }
    }

    if order.len() != graph.len() {
        return Err(match graph.find_cycle() {
            Some(cycle) => Error::CyclicDependency { cycle },
            None => Error::IncompleteGraph {
                package: graph.root().to_string(),
                reason: "packages unreachable from the root remain".to_string(),
            },
        });
    }

    let mut packages = Vec::with_capacity(order.len());
    for name in order {
        let Some(node) = graph.node_by_name(name) else {
            return Err(Error::IncompleteGraph {
                package: name.to_string(),
                reason: "node vanished during ordering".to_string(),
            });
        };

        let options: BTreeMap<String, String> = node
            .options
            .iter()
            .map(|(k, v)| (k.clone(), v.canonical()))
            .collect();
        let requires: Vec<String> = node.children().iter().map(ToString::to_string).collect();

        let mut hasher = Hasher::new();
        hasher.field("name", node.name()).field("version", &node.id().version);
        for (key, value) in &options {
            hasher.field(&format!("option:{}", key), value);
        }
        for (key, value) in &node.settings {
            hasher.field(&format!("setting:{}", key), value);
        }
        for dep in &requires {
            hasher.field("requires", dep);
        }

        packages.push(PlannedPackage {
            name: node.name().to_string(),
            version: node.id().version.clone(),
            package_id: hasher.finalize(),
            options,
            settings: node.settings.clone(),
            requires,
        });
    }

    debug!("Emitted plan with {} packages", packages.len());
    Ok(BuildPlan {
        root: root.id().clone(),
        settings: graph.settings().clone(),
        generators: root.manifest.generators.clone(),
        packages,
    })
}

/// Reject graphs that were not fully resolved
fn check_complete(graph: &DependencyGraph) -> Result<()> {
    let mut seen: BTreeMap<&str, &PackageId> = BTreeMap::new();
    for node in graph.nodes() {
        if let Some(other) = seen.insert(node.name(), node.id()) {
            return Err(Error::IncompleteGraph {
                package: node.name().to_string(),
                reason: format!("both {} and {} remain", other, node.id()),
            });
        }
    }

    for node in graph.nodes() {
        for edge in &node.edges {
            if !graph.contains(&edge.target) {
                return Err(Error::IncompleteGraph {
                    package: node.id().to_string(),
                    reason: format!("edge to {} points outside the graph", edge.target),
                });
            }
        }
        for requirement in &node.manifest.requires {
            if !node.edges.iter().any(|e| e.target.name == requirement.name) {
                return Err(Error::IncompleteGraph {
                    package: node.id().to_string(),
                    reason: format!("requirement {} has no child", requirement),
                });
            }
        }
    }
    Ok(())
}
