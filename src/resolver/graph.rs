// src/resolver/graph.rs

//! Dependency graph data structures and algorithms
//!
//! The graph is an arena keyed by [`PackageId`]. Before conflict resolution
//! it may hold several candidate versions of one package name; afterwards it
//! holds exactly one node per name. Edges refer to their targets by id, so
//! diamonds share a node and cycles are representable (and rejected by
//! [`DependencyGraph::find_cycle`]).

use crate::recipe::{Manifest, OptionValue, PackageId, Requirement};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

/// A dependency edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// The requirement as declared by the parent
    pub requirement: Requirement,
    /// The requirement after pins were applied
    pub effective: Requirement,
    /// Whether a root pin rewrote this requirement
    pub pinned: bool,
    pub target: PackageId,
}

/// A package in the dependency graph
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub manifest: Arc<Manifest>,
    /// Outgoing edges in requirement order
    pub edges: Vec<Edge>,
    /// Effective option values (filled in by conflict resolution)
    pub options: BTreeMap<String, OptionValue>,
    /// Effective settings (filled in by settings propagation)
    pub settings: BTreeMap<String, String>,
}

impl GraphNode {
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self {
            manifest,
            edges: Vec::new(),
            options: BTreeMap::new(),
            settings: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &PackageId {
        &self.manifest.id
    }

    pub fn name(&self) -> &str {
        self.manifest.name()
    }

    /// Distinct child ids, in edge order
    pub fn children(&self) -> Vec<&PackageId> {
        let mut seen = BTreeSet::new();
        self.edges
            .iter()
            .map(|e| &e.target)
            .filter(|t| seen.insert(*t))
            .collect()
    }
}

/// Dependency graph for resolution and ordering
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    root: PackageId,
    nodes: BTreeMap<PackageId, GraphNode>,
    /// Global settings context, set by settings propagation
    settings: BTreeMap<String, String>,
}

impl DependencyGraph {
    /// Create a graph holding only the root
    pub fn new(root: Arc<Manifest>) -> Self {
        let id = root.id.clone();
        let mut nodes = BTreeMap::new();
        nodes.insert(id.clone(), GraphNode::new(root));
        Self {
            root: id,
            nodes,
            settings: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &PackageId {
        &self.root
    }

    pub fn root_node(&self) -> Option<&GraphNode> {
        self.nodes.get(&self.root)
    }

    pub fn node(&self, id: &PackageId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &PackageId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Add a node, replacing any node with the same id
    pub fn insert(&mut self, node: GraphNode) {
        self.nodes.insert(node.id().clone(), node);
    }

    /// All nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.values_mut()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every candidate id for a package name, lowest version first
    pub fn candidates(&self, name: &str) -> Vec<&PackageId> {
        let mut ids: Vec<&PackageId> = self.nodes.keys().filter(|id| id.name == name).collect();
        ids.sort_by(|a, b| a.version().cmp(&b.version()));
        ids
    }

    /// The node for a package name, if exactly one exists
    pub fn node_by_name(&self, name: &str) -> Option<&GraphNode> {
        let mut matches = self.nodes.values().filter(|n| n.name() == name);
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: BTreeMap<String, String>) {
        self.settings = settings;
    }

    /// Breadth-first walk from `start` along edges in declared order
    ///
    /// Returns each reachable id with its depth and the shortest chain of ids
    /// leading to it (starting with `start`, ending with the id itself).
    pub fn breadth_first(&self, start: &PackageId) -> Vec<Visit> {
        let mut visits = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();

        if !self.contains(start) {
            return visits;
        }
        seen.insert(start.clone());
        queue.push_back(Visit {
            id: start.clone(),
            depth: 0,
            chain: vec![start.clone()],
        });

        while let Some(visit) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&visit.id) {
                for edge in &node.edges {
                    if self.contains(&edge.target) && seen.insert(edge.target.clone()) {
                        let mut chain = visit.chain.clone();
                        chain.push(edge.target.clone());
                        queue.push_back(Visit {
                            id: edge.target.clone(),
                            depth: visit.depth + 1,
                            chain,
                        });
                    }
                }
            }
            visits.push(visit);
        }

        visits
    }

    /// Ids reachable from `start`, including `start`
    pub fn reachable_from(&self, start: &PackageId) -> BTreeSet<PackageId> {
        self.breadth_first(start).into_iter().map(|v| v.id).collect()
    }

    /// Find a cycle reachable from the root
    ///
    /// Walks depth-first with an explicit stack. Returns the cycle as a path
    /// that starts and ends with the same id.
    pub fn find_cycle(&self) -> Option<Vec<PackageId>> {
        #[derive(PartialEq)]
        enum Mark {
            Open,
            Done,
        }

        let mut marks: BTreeMap<&PackageId, Mark> = BTreeMap::new();
        let mut stack: Vec<(&PackageId, usize)> = vec![(&self.root, 0)];
        marks.insert(&self.root, Mark::Open);

        while let Some(&(id, next)) = stack.last() {
            let edges = self.nodes.get(id).map(|n| n.edges.as_slice()).unwrap_or(&[]);

            let Some(edge) = edges.get(next) else {
                marks.insert(id, Mark::Done);
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            let target = &edge.target;
            match marks.get(target) {
                Some(Mark::Open) => {
                    let start = stack.iter().position(|(p, _)| *p == target).unwrap_or(0);
                    let mut cycle: Vec<PackageId> =
                        stack[start..].iter().map(|(p, _)| (*p).clone()).collect();
                    cycle.push(target.clone());
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    marks.insert(target, Mark::Open);
                    stack.push((target, 0));
                }
            }
        }

        None
    }

    /// Drop every node not reachable from the root
    pub fn prune_unreachable(&mut self) -> usize {
        let reachable = self.reachable_from(&self.root.clone());
        let before = self.nodes.len();
        self.nodes.retain(|id, _| reachable.contains(id));
        before - self.nodes.len()
    }

    /// Get statistics about the dependency graph
    pub fn stats(&self) -> GraphStats {
        let mut dependents: BTreeMap<&PackageId, usize> = BTreeMap::new();
        let mut total_dependencies = 0;
        let mut max_dependencies = 0;

        for node in self.nodes.values() {
            let children = node.children();
            total_dependencies += children.len();
            max_dependencies = max_dependencies.max(children.len());
            for child in children {
                *dependents.entry(child).or_insert(0) += 1;
            }
        }

        let names: BTreeSet<&str> = self.nodes.values().map(GraphNode::name).collect();

        GraphStats {
            total_packages: self.nodes.len(),
            distinct_names: names.len(),
            total_dependencies,
            max_dependencies,
            max_dependents: dependents.values().copied().max().unwrap_or(0),
        }
    }
}

/// One step of a breadth-first walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub id: PackageId,
    pub depth: usize,
    pub chain: Vec<PackageId>,
}

/// Statistics about the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStats {
    pub total_packages: usize,
    pub distinct_names: usize,
    pub total_dependencies: usize,
    pub max_dependencies: usize,
    pub max_dependents: usize,
}
