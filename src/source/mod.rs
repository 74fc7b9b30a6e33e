// src/source/mod.rs

//! Recipe sources
//!
//! A [`RecipeSource`] turns a package name and version constraint into a
//! parsed manifest. Sources may be slow and may fail transiently; the
//! resolver always talks to them through a [`CachedSource`], which
//! guarantees at most one upstream fetch per distinct request.

mod cache;
mod directory;
mod http;
mod memory;
pub mod retry;

pub use cache::{CacheStats, CachedSource};
pub use directory::{DirectorySource, PACKAGES_DIR, RECIPE_FILE};
pub use http::HttpSource;
pub use memory::MemorySource;
pub use retry::{RetryPolicy, with_retry};

use crate::error::{Error, Result};
use crate::recipe::{Manifest, PackageId};
use crate::version::VersionConstraint;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Lookup key for a prebuilt binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRequest {
    pub package: PackageId,
    /// Hash over the package's effective configuration
    pub package_id: String,
    pub options: BTreeMap<String, String>,
    pub settings: BTreeMap<String, String>,
}

/// Where a prebuilt binary can be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub package: PackageId,
    pub package_id: String,
    /// Filesystem path or URL
    pub location: String,
}

/// A provider of recipes (and optionally prebuilt artifacts)
#[async_trait]
pub trait RecipeSource: Send + Sync {
    /// Fetch the best manifest for `name` satisfying `constraint`
    ///
    /// Returns [`Error::RecipeNotFound`] when no version matches.
    async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>>;

    /// Locate a prebuilt binary for a fully configured package
    async fn fetch_artifact(&self, request: &ArtifactRequest) -> Result<ArtifactHandle> {
        Err(Error::ArtifactUnavailable {
            package: request.package.clone(),
            package_id: request.package_id.clone(),
        })
    }
}

#[async_trait]
impl<T: RecipeSource + ?Sized> RecipeSource for Arc<T> {
    async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>> {
        (**self).fetch(name, constraint).await
    }

    async fn fetch_artifact(&self, request: &ArtifactRequest) -> Result<ArtifactHandle> {
        (**self).fetch_artifact(request).await
    }
}

#[async_trait]
impl<T: RecipeSource + ?Sized> RecipeSource for Box<T> {
    async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>> {
        (**self).fetch(name, constraint).await
    }

    async fn fetch_artifact(&self, request: &ArtifactRequest) -> Result<ArtifactHandle> {
        (**self).fetch_artifact(request).await
    }
}

/// Several sources consulted in order
///
/// A source answering "not found" passes the request on to the next one.
/// Any other failure stops the search.
#[derive(Default)]
pub struct ChainSource {
    sources: Vec<Box<dyn RecipeSource>>,
}

impl ChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source with lower priority than those already added
    pub fn push(&mut self, source: impl RecipeSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn with(mut self, source: impl RecipeSource + 'static) -> Self {
        self.push(source);
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl RecipeSource for ChainSource {
    async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>> {
        for (i, source) in self.sources.iter().enumerate() {
            match source.fetch(name, constraint).await {
                Err(Error::RecipeNotFound { .. }) => {
                    debug!("source #{} has no {}/{}", i, name, constraint);
                }
                other => return other,
            }
        }
        Err(Error::RecipeNotFound {
            name: name.to_string(),
            constraint: constraint.to_string(),
        })
    }

    async fn fetch_artifact(&self, request: &ArtifactRequest) -> Result<ArtifactHandle> {
        for source in &self.sources {
            match source.fetch_artifact(request).await {
                Err(Error::ArtifactUnavailable { .. }) => continue,
                other => return other,
            }
        }
        Err(Error::ArtifactUnavailable {
            package: request.package.clone(),
            package_id: request.package_id.clone(),
        })
    }
}
