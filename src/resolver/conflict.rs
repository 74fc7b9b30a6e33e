// src/resolver/conflict.rs

//! Conflict resolution
//!
//! Collapses the candidate graph to one version per package name, then
//! computes every node's effective options.
//!
//! Versions are selected to a fixed point. Each round walks the graph from
//! the root following the current selection and records every request on
//! every name; the candidate satisfying the most requests wins, ties going
//! to the candidate fetched by the earliest request and then to the highest
//! version. Once the selection is stable every request must be satisfied.
//!
//! Option overrides apply to a package only when it is reachable from the
//! declaring recipe. The override declared closest to the root wins; two
//! disagreeing overrides at the same depth are a conflict.

use super::graph::{DependencyGraph, GraphNode, Visit};
use crate::error::{Error, Result};
use crate::recipe::{OptionOverride, OptionValue, PackageId, Requirement};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};

/// A requirement together with the chain of packages that made it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestChain {
    /// Requesting packages, root first
    pub chain: Vec<PackageId>,
    pub requirement: Requirement,
    pub pinned: bool,
}

impl fmt::Display for RequestChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_chain(f, &self.chain)?;
        write!(f, " requires {}", self.requirement)?;
        if self.pinned {
            f.write_str(" (pinned)")?;
        }
        Ok(())
    }
}

/// An option assignment together with the chain leading to its declarer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideChain {
    /// Packages from the root to the declaring recipe
    pub chain: Vec<PackageId>,
    pub assignment: OptionOverride,
}

impl fmt::Display for OverrideChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_chain(f, &self.chain)?;
        write!(f, " sets {}", self.assignment)
    }
}

fn write_chain(f: &mut fmt::Formatter<'_>, chain: &[PackageId]) -> fmt::Result {
    for (i, id) in chain.iter().enumerate() {
        if i > 0 {
            f.write_str(" -> ")?;
        }
        write!(f, "{}", id)?;
    }
    Ok(())
}

/// One request observed during a selection round
#[derive(Debug, Clone)]
struct Request {
    chain: RequestChain,
    /// The candidate the builder fetched for this request
    fetched: PackageId,
}

impl Request {
    fn satisfied_by(&self, id: &PackageId) -> bool {
        self.chain.pinned || self.chain.requirement.matches(id)
    }
}

type Selection = BTreeMap<String, PackageId>;

/// Resolve versions and options, returning a graph with one node per name
pub fn resolve(graph: DependencyGraph) -> Result<DependencyGraph> {
    let selection = select_versions(&graph)?;
    let mut resolved = collapse(graph, &selection);

    if let Some(cycle) = resolved.find_cycle() {
        return Err(Error::CyclicDependency { cycle });
    }

    resolve_options(&mut resolved)?;
    info!("Resolved {} packages", resolved.len());
    Ok(resolved)
}

fn select_versions(graph: &DependencyGraph) -> Result<Selection> {
    let root = graph.root().clone();
    let mut selection = Selection::new();
    selection.insert(root.name.clone(), root.clone());

    let max_rounds = graph.len() + 1;
    for round in 1..=max_rounds {
        let requests = collect_requests(graph, &selection);
        let next = choose(graph, &root, &requests);

        if next == selection {
            debug!("Version selection converged after {} rounds", round);
            validate_selection(&selection, &requests)?;
            return Ok(selection);
        }

        for (name, id) in &next {
            if selection.get(name) != Some(id) {
                debug!("Round {}: selecting {}", round, id);
            }
        }
        selection = next;
    }

    // Still moving: report the first name whose choice keeps changing
    let requests = collect_requests(graph, &selection);
    let next = choose(graph, &root, &requests);
    let unstable = requests
        .iter()
        .find(|(name, _)| next.get(*name) != selection.get(*name))
        .or_else(|| requests.iter().next());
    match unstable {
        Some((name, requests)) => Err(Error::VersionConflict {
            package: name.clone(),
            requests: requests.iter().map(|r| r.chain.clone()).collect(),
        }),
        None => Ok(selection),
    }
}

/// Walk from the root following the selection, recording every request
fn collect_requests(graph: &DependencyGraph, selection: &Selection) -> BTreeMap<String, Vec<Request>> {
    let mut requests: BTreeMap<String, Vec<Request>> = BTreeMap::new();
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::new();

    let root = graph.root().clone();
    seen.insert(root.clone());
    queue.push_back((root.clone(), vec![root]));

    while let Some((id, chain)) = queue.pop_front() {
        let Some(node) = graph.node(&id) else {
            continue;
        };
        for edge in &node.edges {
            requests
                .entry(edge.target.name.clone())
                .or_default()
                .push(Request {
                    chain: RequestChain {
                        chain: chain.clone(),
                        requirement: edge.effective.clone(),
                        pinned: edge.pinned,
                    },
                    fetched: edge.target.clone(),
                });

            let next = selection
                .get(&edge.target.name)
                .filter(|selected| graph.contains(selected))
                .unwrap_or(&edge.target)
                .clone();
            if seen.insert(next.clone()) {
                let mut next_chain = chain.clone();
                next_chain.push(next.clone());
                queue.push_back((next, next_chain));
            }
        }
    }

    requests
}

/// Pick one candidate per requested name
fn choose(
    graph: &DependencyGraph,
    root: &PackageId,
    requests: &BTreeMap<String, Vec<Request>>,
) -> Selection {
    let mut selection = Selection::new();
    selection.insert(root.name.clone(), root.clone());

    for (name, requests) in requests {
        if *name == root.name {
            continue;
        }

        if let Some(pinned) = requests.iter().find(|r| r.chain.pinned) {
            selection.insert(name.clone(), pinned.fetched.clone());
            continue;
        }

        let candidates = graph.candidates(name);
        let score = |id: &PackageId| requests.iter().filter(|r| r.satisfied_by(id)).count();
        let Some(best) = candidates.iter().map(|id| score(*id)).max() else {
            continue;
        };
        let tied: Vec<&PackageId> = candidates
            .iter()
            .copied()
            .filter(|id| score(*id) == best)
            .collect();

        // Proximity first: the candidate the earliest request brought in
        let chosen = requests
            .iter()
            .map(|r| &r.fetched)
            .find(|fetched| tied.contains(fetched))
            .or_else(|| tied.last().copied());

        if let Some(chosen) = chosen {
            selection.insert(name.clone(), chosen.clone());
        }
    }

    selection
}

fn validate_selection(
    selection: &Selection,
    requests: &BTreeMap<String, Vec<Request>>,
) -> Result<()> {
    for (name, requests) in requests {
        let Some(selected) = selection.get(name) else {
            continue;
        };
        if requests.iter().any(|r| !r.satisfied_by(selected)) {
            return Err(Error::VersionConflict {
                package: name.clone(),
                requests: requests.iter().map(|r| r.chain.clone()).collect(),
            });
        }
    }
    Ok(())
}

/// Keep only selected nodes reachable from the root and point every edge at
/// the selected version of its target
fn collapse(graph: DependencyGraph, selection: &Selection) -> DependencyGraph {
    let root_id = graph.root().clone();
    let Some(root) = graph.node(&root_id) else {
        return graph;
    };
    let mut resolved = DependencyGraph::new(root.manifest.clone());

    for id in selection.values() {
        let Some(node) = graph.node(id) else {
            continue;
        };
        let mut node = node.clone();
        for edge in &mut node.edges {
            if let Some(selected) = selection.get(&edge.target.name) {
                edge.target = selected.clone();
            }
        }
        resolved.insert(node);
    }

    let dropped = resolved.prune_unreachable();
    debug!(
        "Collapsed {} candidates to {} packages ({} unreachable)",
        graph.len(),
        resolved.len(),
        dropped
    );
    resolved
}

/// An applicable override on its way to a target node
struct Assignment {
    depth: usize,
    declarer: Visit,
    assignment: OptionOverride,
}

fn resolve_options(graph: &mut DependencyGraph) -> Result<()> {
    let visits = graph.breadth_first(graph.root());
    let root = graph.root().clone();

    let mut assignments: BTreeMap<(PackageId, String), Vec<Assignment>> = BTreeMap::new();
    for visit in &visits {
        let Some(declarer) = graph.node(&visit.id) else {
            continue;
        };
        let mut reachable: Option<BTreeSet<PackageId>> = None;

        for (target_name, assignment) in declarer.manifest.dependency_overrides() {
            let Some(target) = graph.node_by_name(target_name) else {
                if visit.id == root {
                    warn!(
                        "{} sets {} but {} is not in the graph, ignoring",
                        visit.id, assignment, target_name
                    );
                } else {
                    debug!("{} sets {} for absent {}", visit.id, assignment, target_name);
                }
                continue;
            };

            let reachable = reachable.get_or_insert_with(|| graph.reachable_from(&visit.id));
            if !reachable.contains(target.id()) {
                debug!("{} sets {} but does not depend on it", visit.id, assignment);
                continue;
            }

            check_domain(&visit.id, target, assignment)?;
            assignments
                .entry((target.id().clone(), assignment.option.clone()))
                .or_default()
                .push(Assignment {
                    depth: visit.depth,
                    declarer: visit.clone(),
                    assignment: assignment.clone(),
                });
        }
    }

    let mut effective: BTreeMap<PackageId, BTreeMap<String, OptionValue>> = graph
        .nodes()
        .map(|node| (node.id().clone(), node.manifest.defaults.clone()))
        .collect();

    for ((target, option), candidates) in assignments {
        let Some(closest) = candidates.iter().map(|a| a.depth).min() else {
            continue;
        };
        let winners: Vec<&Assignment> = candidates.iter().filter(|a| a.depth == closest).collect();
        let value = &winners[0].assignment.value;

        if winners.iter().any(|a| !a.assignment.value.same_as(value)) {
            return Err(Error::OptionConflict {
                package: target.name.clone(),
                option,
                assignments: winners
                    .iter()
                    .map(|a| OverrideChain {
                        chain: a.declarer.chain.clone(),
                        assignment: a.assignment.clone(),
                    })
                    .collect(),
            });
        }

        debug!(
            "{}:{} = {} (set by {})",
            target.name, option, value, winners[0].declarer.id
        );
        if let Some(options) = effective.get_mut(&target) {
            options.insert(option, value.clone());
        }
    }

    for node in graph.nodes_mut() {
        if let Some(options) = effective.remove(node.id()) {
            node.options = options;
        }
    }
    Ok(())
}

fn check_domain(declarer: &PackageId, target: &GraphNode, assignment: &OptionOverride) -> Result<()> {
    let field = format!("default_options.\"{}\"", assignment.key());
    let Some(domain) = target.manifest.options.get(&assignment.option) else {
        return Err(Error::InvalidOptionValue {
            manifest: declarer.to_string(),
            field,
            reason: format!("{} declares no option `{}`", target.id(), assignment.option),
        });
    };
    if !domain.contains(&assignment.value) {
        return Err(Error::InvalidOptionValue {
            manifest: declarer.to_string(),
            field,
            reason: format!(
                "`{}` is not one of {} for {}",
                assignment.value,
                domain,
                target.id()
            ),
        });
    }
    Ok(())
}
