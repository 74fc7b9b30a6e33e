// src/lib.rs

//! Kiln dependency resolver
//!
//! Resolves a root recipe and its transitive requirements into one
//! reproducible build plan for native packages.
//!
//! # Architecture
//!
//! - Recipes: TOML manifests declaring requirements, options and settings
//! - Sources: where recipes come from (memory, directory, HTTP, chained),
//!   behind a single-flight cache
//! - Resolution: candidate graph, version and option conflict resolution,
//!   settings propagation, topological plan emission
//! - Lockfile: the plan written to disk, byte-identical for identical inputs

pub mod config;
pub mod error;
pub mod hash;
pub mod recipe;
pub mod resolver;
pub mod source;
pub mod version;

pub use config::{CONFIG_FILE_NAME, Config, SourceConfig};
pub use error::{Error, ErrorKind, Result};
pub use recipe::{Manifest, PackageId, Requirement};
pub use resolver::{
    BuildPlan, DependencyGraph, Generator, LOCKFILE_NAME, Lockfile, LockfileError,
    PlannedPackage, Resolver, ResolverConfig, Settings,
};
pub use source::{
    ArtifactHandle, ArtifactRequest, CachedSource, ChainSource, DirectorySource, HttpSource,
    MemorySource, RecipeSource, RetryPolicy,
};
pub use version::{Version, VersionConstraint};
