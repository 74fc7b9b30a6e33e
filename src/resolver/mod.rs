// src/resolver/mod.rs

//! Dependency resolution pipeline
//!
//! Resolution runs in four stages, each consuming the previous stage's graph:
//!
//! 1. [`GraphBuilder`] fetches recipes and builds the candidate graph
//! 2. [`conflict::resolve`] picks one version per package and computes options
//! 3. [`settings::apply`] propagates global and per-package settings
//! 4. [`plan::emit`] orders the packages into a [`BuildPlan`]
//!
//! [`Resolver`] wires the stages together behind a single-flight recipe cache.

pub mod builder;
pub mod conflict;
pub mod graph;
pub mod lockfile;
pub mod plan;
pub mod settings;

pub use builder::{DEFAULT_MAX_CONCURRENT, GraphBuilder};
pub use conflict::{OverrideChain, RequestChain};
pub use graph::{DependencyGraph, Edge, GraphNode, GraphStats};
pub use lockfile::{LOCKFILE_NAME, LockedPackage, Lockfile, LockfileError};
pub use plan::{BuildPlan, Generator, PlannedPackage};
pub use settings::Settings;

use crate::error::{Error, Result};
use crate::recipe::Manifest;
use crate::source::{ArtifactHandle, CacheStats, CachedSource, RecipeSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Resolver tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverConfig {
    /// Upper bound on recipe fetches in flight
    pub max_concurrent_fetches: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// End-to-end resolver: recipe source in, build plan out
pub struct Resolver<S> {
    source: CachedSource<S>,
    config: ResolverConfig,
}

impl<S: RecipeSource> Resolver<S> {
    pub fn new(source: S, config: ResolverConfig) -> Self {
        Self {
            source: CachedSource::new(source),
            config,
        }
    }

    /// The cached source, shared across every `resolve` call on this resolver
    pub fn source(&self) -> &CachedSource<S> {
        &self.source
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.source.stats()
    }

    /// Build the candidate graph only
    pub async fn graph(&self, root: impl Into<Arc<Manifest>>) -> Result<DependencyGraph> {
        GraphBuilder::new(&self.source)
            .max_concurrent(self.config.max_concurrent_fetches)
            .build(root)
            .await
    }

    /// Resolve `root` under `settings` into a build plan
    pub async fn resolve(
        &self,
        root: impl Into<Arc<Manifest>>,
        settings: &Settings,
    ) -> Result<BuildPlan> {
        let root: Arc<Manifest> = root.into();
        info!("Resolving {} with settings [{}]", root.id, settings);

        let graph = self.graph(Arc::clone(&root)).await?;
        let stats = graph.stats();
        info!(
            "Stage 1/4: {} candidates for {} packages",
            stats.total_packages, stats.distinct_names
        );

        let graph = conflict::resolve(graph)?;
        info!("Stage 2/4: {} packages after conflict resolution", graph.len());

        let graph = settings::apply(graph, settings)?;
        info!("Stage 3/4: settings applied");

        let plan = plan::emit(&graph)?;
        let cache = self.cache_stats();
        info!(
            "Stage 4/4: plan for {} has {} packages ({} recipe fetches, {} coalesced)",
            root.id,
            plan.packages.len(),
            cache.upstream_fetches,
            cache.coalesced
        );
        Ok(plan)
    }

    /// Ask the source for a prebuilt binary of every planned package
    ///
    /// Packages without one map to `None`; any other source failure aborts.
    pub async fn locate_artifacts(
        &self,
        plan: &BuildPlan,
    ) -> Result<Vec<(PlannedPackage, Option<ArtifactHandle>)>> {
        let mut located = Vec::with_capacity(plan.packages.len());
        for (package, request) in plan.packages.iter().zip(plan.artifact_requests()) {
            let handle = match self.source.fetch_artifact(&request).await {
                Ok(handle) => Some(handle),
                Err(Error::ArtifactUnavailable { .. }) => None,
                Err(e) => return Err(e),
            };
            located.push((package.clone(), handle));
        }
        Ok(located)
    }
}
