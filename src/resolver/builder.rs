// src/resolver/builder.rs

//! Graph construction
//!
//! Expands the root manifest level by level. Every requirement on the
//! current level becomes one fetch job; jobs run concurrently (bounded) and
//! their results are reassembled in declared order, so the graph never
//! depends on which fetch finishes first. The first failure cancels the
//! rest of the level.

use super::graph::{DependencyGraph, Edge, GraphNode};
use crate::error::{Error, Result};
use crate::recipe::{Manifest, PackageId, Requirement};
use crate::source::RecipeSource;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Default bound on concurrent recipe fetches
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// A requirement waiting to be fetched
struct Job {
    parent: PackageId,
    declared: Requirement,
    effective: Requirement,
    pinned: bool,
}

pub struct GraphBuilder<'a, S: ?Sized> {
    source: &'a S,
    max_concurrent: usize,
}

impl<'a, S: RecipeSource + ?Sized> GraphBuilder<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Limit the number of fetches in flight (at least one)
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n.max(1);
        self
    }

    /// Build the candidate graph rooted at `root`
    pub async fn build(&self, root: impl Into<Arc<Manifest>>) -> Result<DependencyGraph> {
        let root: Arc<Manifest> = root.into();
        let root_pins: BTreeMap<&str, &Requirement> =
            root.pins.iter().map(|p| (p.name.as_str(), p)).collect();

        let mut graph = DependencyGraph::new(Arc::clone(&root));
        let mut level = vec![root.id.clone()];
        let mut depth = 0;

        while !level.is_empty() {
            let mut jobs = Vec::new();
            for parent in &level {
                let Some(node) = graph.node(parent) else {
                    continue;
                };
                let manifest = Arc::clone(&node.manifest);
                for declared in &manifest.requires {
                    let (effective, pinned) = match root_pins.get(declared.name.as_str()) {
                        Some(pin) => ((*pin).clone(), true),
                        None => match manifest.pin_for(&declared.name) {
                            Some(own) => (own.clone(), false),
                            None => (declared.clone(), false),
                        },
                    };
                    jobs.push(Job {
                        parent: parent.clone(),
                        declared: declared.clone(),
                        effective,
                        pinned,
                    });
                }
            }

            debug!(
                "Expanding level {}: {} packages, {} requirements",
                depth,
                level.len(),
                jobs.len()
            );

            // The first error, whichever job it comes from, drops the stream
            // and with it every fetch still in flight
            let mut fetched: Vec<(usize, Arc<Manifest>)> =
                stream::iter(jobs.iter().enumerate())
                    .map(|(i, job)| async move {
                        self.fetch_one(&job.effective).await.map(|m| (i, m))
                    })
                    .buffer_unordered(self.max_concurrent)
                    .try_collect()
                    .await?;
            fetched.sort_by_key(|(i, _)| *i);

            let mut next = Vec::new();
            for (job, (_, manifest)) in jobs.into_iter().zip(fetched) {
                let target = manifest.id.clone();
                if !graph.contains(&target) {
                    graph.insert(GraphNode::new(manifest));
                    next.push(target.clone());
                }
                if let Some(parent) = graph.node_mut(&job.parent) {
                    parent.edges.push(Edge {
                        requirement: job.declared,
                        effective: job.effective,
                        pinned: job.pinned,
                        target,
                    });
                }
            }

            level = next;
            depth += 1;
        }

        if let Some(cycle) = graph.find_cycle() {
            return Err(Error::CyclicDependency { cycle });
        }

        info!(
            "Built dependency graph for {}: {} candidates over {} levels",
            root.id,
            graph.len(),
            depth
        );
        Ok(graph)
    }

    /// Fetch one requirement and check the source answered what was asked
    async fn fetch_one(&self, requirement: &Requirement) -> Result<Arc<Manifest>> {
        let manifest = self
            .source
            .fetch(&requirement.name, &requirement.constraint)
            .await?;

        if manifest.name() != requirement.name {
            return Err(Error::FetchFailed {
                name: requirement.name.clone(),
                constraint: requirement.constraint.to_string(),
                reason: format!("source returned {} instead", manifest.id),
                transient: false,
            });
        }
        if !requirement.matches(&manifest.id) {
            return Err(Error::FetchFailed {
                name: requirement.name.clone(),
                constraint: requirement.constraint.to_string(),
                reason: format!("source returned {} which does not satisfy it", manifest.id),
                transient: false,
            });
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse;
    use crate::source::{CachedSource, MemorySource};
    use crate::version::VersionConstraint;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn recipe(name: &str, version: &str, requires: &[&str]) -> Manifest {
        let requires: Vec<String> = requires.iter().map(|r| format!("\"{}\"", r)).collect();
        parse(
            format!(
                "name = \"{}\"\nversion = \"{}\"\nrequires = [{}]\n",
                name,
                version,
                requires.join(", ")
            )
            .as_bytes(),
        )
        .unwrap()
    }

    fn source(recipes: Vec<Manifest>) -> MemorySource {
        recipes
            .into_iter()
            .fold(MemorySource::new(), MemorySource::with_manifest)
    }

    #[tokio::test]
    async fn test_builds_diamond() {
        let source = source(vec![
            recipe("a", "1.0", &["c/1.0"]),
            recipe("b", "1.0", &["c/1.0"]),
            recipe("c", "1.0", &[]),
        ]);
        let root = recipe("r", "1.0", &["a/1.0", "b/1.0"]);
        let graph = GraphBuilder::new(&source).build(root).await.unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.candidates("c").len(), 1);
        let root = graph.root_node().unwrap();
        let targets: Vec<String> = root.edges.iter().map(|e| e.target.to_string()).collect();
        assert_eq!(targets, vec!["a/1.0", "b/1.0"]);
    }

    #[tokio::test]
    async fn test_keeps_every_candidate_version() {
        let source = source(vec![
            recipe("a", "1.0", &[]),
            recipe("a", "2.0", &[]),
            recipe("b", "1.0", &["a/2.0"]),
        ]);
        let root = recipe("r", "1.0", &["a/1.0", "b/1.0"]);
        let graph = GraphBuilder::new(&source).build(root).await.unwrap();
        assert_eq!(graph.candidates("a").len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_cycle() {
        let source = source(vec![recipe("a", "1.0", &["b/1.0"]), recipe("b", "1.0", &["a/1.0"])]);
        let root = recipe("r", "1.0", &["a/1.0"]);
        let err = GraphBuilder::new(&source).build(root).await.unwrap_err();
        assert!(
            matches!(err, Error::CyclicDependency { ref cycle } if cycle.first() == cycle.last())
        );
    }

    #[tokio::test]
    async fn test_missing_recipe_fails_build() {
        let source = source(vec![recipe("a", "1.0", &["ghost/1.0"])]);
        let root = recipe("r", "1.0", &["a/1.0"]);
        let err = GraphBuilder::new(&source).build(root).await.unwrap_err();
        assert!(matches!(err, Error::RecipeNotFound { ref name, .. } if name == "ghost"));
    }

    #[tokio::test]
    async fn test_root_pin_rewrites_transitive_requirement() {
        let source = source(vec![
            recipe("a", "1.0", &["zlib/[>=1.2 <2]"]),
            recipe("zlib", "1.2.11", &[]),
            recipe("zlib", "1.2.13", &[]),
        ]);
        let mut root = recipe("r", "1.0", &["a/1.0"]);
        root.pins = vec![Requirement::new(
            "zlib",
            VersionConstraint::parse("1.2.11").unwrap(),
        )];
        let graph = GraphBuilder::new(&source).build(root).await.unwrap();

        let a = graph.node(&PackageId::new("a", "1.0")).unwrap();
        assert!(a.edges[0].pinned);
        assert_eq!(a.edges[0].requirement.to_string(), "zlib/[>=1.2 <2]");
        assert_eq!(a.edges[0].target, PackageId::new("zlib", "1.2.11"));
        assert_eq!(graph.candidates("zlib").len(), 1);
    }

    #[tokio::test]
    async fn test_sibling_fetches_are_single_flight() {
        let memory = source(vec![
            recipe("a", "1.0", &["d/1.0"]),
            recipe("b", "1.0", &["d/1.0"]),
            recipe("d", "1.0", &[]),
        ])
        .with_latency(Duration::from_millis(10));
        let cached = CachedSource::new(memory);
        let root = recipe("r", "1.0", &["a/1.0", "b/1.0"]);
        GraphBuilder::new(&cached)
            .max_concurrent(4)
            .build(root)
            .await
            .unwrap();
        assert_eq!(cached.inner().fetch_count("d", "1.0"), 1);
    }

    /// Answers every request with the same manifest
    struct WrongAnswer(Arc<Manifest>);

    #[async_trait]
    impl RecipeSource for WrongAnswer {
        async fn fetch(&self, _: &str, _: &VersionConstraint) -> Result<Arc<Manifest>> {
            Ok(Arc::clone(&self.0))
        }
    }

    #[tokio::test]
    async fn test_rejects_mismatched_answer() {
        let source = WrongAnswer(Arc::new(recipe("imposter", "1.0", &[])));
        let root = recipe("r", "1.0", &["a/1.0"]);
        let err = GraphBuilder::new(&source).build(root).await.unwrap_err();
        assert!(matches!(err, Error::FetchFailed { transient: false, .. }));
    }

    #[tokio::test]
    async fn test_child_order_is_declared_order() {
        let source = source(vec![
            recipe("zeta", "1.0", &[]),
            recipe("alpha", "1.0", &[]),
            recipe("mid", "1.0", &[]),
        ])
        .with_latency(Duration::from_millis(5));
        let root = recipe("r", "1.0", &["zeta/1.0", "alpha/1.0", "mid/1.0"]);
        let graph = GraphBuilder::new(&source)
            .max_concurrent(3)
            .build(root)
            .await
            .unwrap();
        let names: Vec<&str> = graph
            .root_node()
            .unwrap()
            .edges
            .iter()
            .map(|e| e.target.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    /// `slow` answers after a long delay; everything else is missing
    struct SlowSibling {
        completed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RecipeSource for SlowSibling {
        async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>> {
            if name == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
                self.completed.fetch_add(1, Ordering::SeqCst);
                return Ok(Arc::new(recipe("slow", "1.0", &[])));
            }
            Err(Error::RecipeNotFound {
                name: name.to_string(),
                constraint: constraint.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_first_failure_cancels_siblings() {
        let completed = Arc::new(AtomicUsize::new(0));
        let source = SlowSibling {
            completed: Arc::clone(&completed),
        };
        let root = recipe("r", "1.0", &["slow/1.0", "ghost/1.0"]);

        let started = Instant::now();
        let err = GraphBuilder::new(&source)
            .max_concurrent(2)
            .build(root)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RecipeNotFound { ref name, .. } if name == "ghost"));
        assert!(started.elapsed() < Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }
}
