// src/source/cache.rs

//! Single-flight recipe cache
//!
//! When several fetch jobs ask for the same `name/constraint` at once, only
//! one upstream request is made and every caller receives the same
//! `Arc<Manifest>`. Each result is also registered under its identity key
//! (`name/version`), so a later exact request for a package first reached
//! through a range is served without going upstream.
//!
//! Failures are not cached: the cell stays empty and the next caller tries
//! again.

use super::{ArtifactHandle, ArtifactRequest, RecipeSource};
use crate::error::Result;
use crate::recipe::Manifest;
use crate::version::VersionConstraint;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::OnceCell;
use tracing::debug;

type Slot = Arc<OnceCell<Arc<Manifest>>>;

/// Counters describing cache effectiveness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests forwarded to the wrapped source
    pub upstream_fetches: u64,
    /// Requests answered from the cache or by joining an in-flight fetch
    pub coalesced: u64,
    /// Distinct keys held
    pub entries: usize,
}

pub struct CachedSource<S> {
    inner: S,
    slots: DashMap<String, Slot>,
    upstream_fetches: AtomicU64,
    coalesced: AtomicU64,
}

impl<S: RecipeSource> CachedSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            slots: DashMap::new(),
            upstream_fetches: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    /// The wrapped source
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            entries: self.slots.len(),
        }
    }

    fn slot(&self, key: &str) -> Slot {
        // Clone the Arc so the shard lock is released before any await
        self.slots.entry(key.to_string()).or_default().clone()
    }

    /// Publish a result under its identity key, returning the canonical instance
    fn register_identity(&self, manifest: Arc<Manifest>) -> Arc<Manifest> {
        let slot = self.slot(&manifest.id.to_string());
        match slot.set(Arc::clone(&manifest)) {
            Ok(()) => manifest,
            Err(_) => slot.get().cloned().unwrap_or(manifest),
        }
    }
}

#[async_trait]
impl<S: RecipeSource> RecipeSource for CachedSource<S> {
    async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>> {
        let key = format!("{}/{}", name, constraint);
        let slot = self.slot(&key);

        let went_upstream = AtomicBool::new(false);
        let flag = &went_upstream;
        let manifest = slot
            .get_or_try_init(|| async move {
                flag.store(true, Ordering::Relaxed);
                self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for {}, fetching upstream", key);
                // A range slot must hold the same instance as the identity slot
                self.inner.fetch(name, constraint).await.map(|fetched| {
                    if constraint.exact().is_some() {
                        fetched
                    } else {
                        self.register_identity(fetched)
                    }
                })
            })
            .await?
            .clone();

        if !went_upstream.load(Ordering::Relaxed) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            debug!("Coalesced request for {}/{}", name, constraint);
        }
        Ok(manifest)
    }

    async fn fetch_artifact(&self, request: &ArtifactRequest) -> Result<ArtifactHandle> {
        self.inner.fetch_artifact(request).await
    }
}
