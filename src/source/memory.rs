// src/source/memory.rs

//! In-memory recipe source
//!
//! Holds manifests registered up front and counts how often each identity
//! is served, which makes it the source of choice for tests and for
//! embedding the resolver in other tools.

use super::RecipeSource;
use crate::error::{Error, Result};
use crate::recipe::{Manifest, PackageId, parse};
use crate::version::VersionConstraint;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct MemorySource {
    /// name -> version text -> manifest
    recipes: BTreeMap<String, BTreeMap<String, Arc<Manifest>>>,
    fetches: DashMap<PackageId, u64>,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manifest, replacing any with the same identity
    pub fn insert(&mut self, manifest: Manifest) {
        self.recipes
            .entry(manifest.id.name.clone())
            .or_default()
            .insert(manifest.id.version.clone(), Arc::new(manifest));
    }

    /// Parse and register recipe text
    pub fn add_recipe(&mut self, text: &str) -> Result<PackageId> {
        let manifest = parse(text.as_bytes())?;
        let id = manifest.id.clone();
        self.insert(manifest);
        Ok(id)
    }

    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.insert(manifest);
        self
    }

    pub fn with_recipe(mut self, text: &str) -> Result<Self> {
        self.add_recipe(text)?;
        Ok(self)
    }

    /// Delay every fetch, so concurrent requests overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// How many times `name/version` has been served
    pub fn fetch_count(&self, name: &str, version: &str) -> u64 {
        self.fetches
            .get(&PackageId::new(name, version))
            .map(|count| *count)
            .unwrap_or(0)
    }

    /// Total number of manifests served
    pub fn total_fetches(&self) -> u64 {
        self.fetches.iter().map(|entry| *entry.value()).sum()
    }

    pub fn len(&self) -> usize {
        self.recipes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    fn lookup(&self, name: &str, constraint: &VersionConstraint) -> Option<Arc<Manifest>> {
        let versions = self.recipes.get(name)?;
        if let Some(exact) = constraint.exact() {
            return versions.get(exact.as_str()).cloned();
        }
        versions
            .values()
            .filter(|m| constraint.satisfies(&m.id.version()))
            .max_by(|a, b| a.id.version().cmp(&b.id.version()))
            .cloned()
    }
}

#[async_trait]
impl RecipeSource for MemorySource {
    async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let manifest = self
            .lookup(name, constraint)
            .ok_or_else(|| Error::RecipeNotFound {
                name: name.to_string(),
                constraint: constraint.to_string(),
            })?;
        *self.fetches.entry(manifest.id.clone()).or_insert(0) += 1;
        Ok(manifest)
    }
}
