// src/resolver/lockfile.rs

//! Lockfile for reproducible builds
//!
//! The lockfile (`kiln.lock`) captures a build plan: every package with its
//! exact version, package id, options and settings. It carries no timestamp,
//! so locking the same inputs twice produces byte-identical files.
//!
//! # Example
//!
//! ```toml
//! [metadata]
//! version = 1
//! generator = "kiln 0.1.0"
//! package = "xrpl/1.8.5"
//! generators = ["cmake_find_package"]
//! plan_hash = "9f2c..."
//!
//! [settings]
//! os = "Linux"
//!
//! [[packages]]
//! name = "zlib"
//! version = "1.2.11"
//! package_id = "3b1e..."
//! requires = []
//!
//! [packages.options]
//! shared = "false"
//! ```

use super::plan::BuildPlan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Current lockfile format version
pub const LOCKFILE_VERSION: u32 = 1;

/// Default lockfile name
pub const LOCKFILE_NAME: &str = "kiln.lock";

#[derive(Error, Debug)]
pub enum LockfileError {
    #[error("Failed to read lockfile: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse lockfile: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize lockfile: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Lockfile version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Lockfile is for {expected}, plan is for {found}")]
    RootMismatch { expected: String, found: String },

    #[error("Package mismatch: {name} locked at {expected}, resolved {found}")]
    PackageMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("Missing package in lockfile: {0}")]
    MissingPackage(String),

    #[error("Package no longer in plan: {0}")]
    ExtraPackage(String),

    #[error("Settings mismatch: {key} locked as {expected:?}, resolved {found:?}")]
    SettingsMismatch {
        key: String,
        expected: Option<String>,
        found: Option<String>,
    },
}

/// Lockfile root structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lockfile {
    pub metadata: LockfileMetadata,

    /// Global settings the plan was resolved under
    #[serde(default)]
    pub settings: BTreeMap<String, String>,

    /// Packages in build order
    #[serde(default)]
    pub packages: Vec<LockedPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileMetadata {
    /// Lockfile format version
    pub version: u32,

    /// Tool that generated the lockfile
    pub generator: String,

    /// Root package (`name/version`)
    pub package: String,

    #[serde(default)]
    pub generators: Vec<String>,

    /// Hash of the plan this lockfile was written from
    pub plan_hash: String,
}

/// A locked package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockedPackage {
    pub name: String,

    /// Exact resolved version
    pub version: String,

    /// Configuration hash
    pub package_id: String,

    /// Direct dependencies (`name/version`)
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// Settings differing from the global ones
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Lockfile {
    /// Capture a build plan
    pub fn from_plan(plan: &BuildPlan) -> crate::Result<Self> {
        let packages = plan
            .packages
            .iter()
            .map(|p| LockedPackage {
                name: p.name.clone(),
                version: p.version.clone(),
                package_id: p.package_id.clone(),
                requires: p.requires.clone(),
                options: p.options.clone(),
                settings: p
                    .settings
                    .iter()
                    .filter(|(k, v)| plan.settings.get(*k) != Some(*v))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })
            .collect();

        Ok(Self {
            metadata: LockfileMetadata {
                version: LOCKFILE_VERSION,
                generator: format!("kiln {}", env!("CARGO_PKG_VERSION")),
                package: plan.root.to_string(),
                generators: plan.generators.clone(),
                plan_hash: plan.plan_hash()?,
            },
            settings: plan.settings.clone(),
            packages,
        })
    }

    /// Load lockfile from a path
    pub fn from_file(path: &Path) -> Result<Self, LockfileError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse lockfile from TOML string
    pub fn parse(content: &str) -> Result<Self, LockfileError> {
        let lockfile: Lockfile = toml::from_str(content)?;

        if lockfile.metadata.version > LOCKFILE_VERSION {
            return Err(LockfileError::VersionMismatch {
                expected: LOCKFILE_VERSION,
                found: lockfile.metadata.version,
            });
        }

        Ok(lockfile)
    }

    /// Write lockfile to a path
    pub fn write_to_file(&self, path: &Path) -> Result<(), LockfileError> {
        let content = self.to_toml()?;
        let mut file = fs::File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String, LockfileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get a package by name
    pub fn get_package(&self, name: &str) -> Option<&LockedPackage> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Check that a freshly resolved plan matches this lockfile
    ///
    /// Returns every mismatch found rather than stopping at the first.
    pub fn validate_against(&self, plan: &BuildPlan) -> Result<(), Vec<LockfileError>> {
        let mut errors = Vec::new();

        let root = plan.root.to_string();
        if root != self.metadata.package {
            errors.push(LockfileError::RootMismatch {
                expected: self.metadata.package.clone(),
                found: root,
            });
        }

        let mut keys: Vec<&String> = self.settings.keys().chain(plan.settings.keys()).collect();
        keys.sort();
        keys.dedup();
        for key in keys {
            let expected = self.settings.get(key);
            let found = plan.settings.get(key);
            if expected != found {
                errors.push(LockfileError::SettingsMismatch {
                    key: key.clone(),
                    expected: expected.cloned(),
                    found: found.cloned(),
                });
            }
        }

        for locked in &self.packages {
            let Some(current) = plan.package(&locked.name) else {
                errors.push(LockfileError::ExtraPackage(locked.name.clone()));
                continue;
            };
            if current.version != locked.version {
                errors.push(LockfileError::PackageMismatch {
                    name: locked.name.clone(),
                    expected: locked.version.clone(),
                    found: current.version.clone(),
                });
            }
            // The package id covers options, settings and dependencies
            if current.package_id != locked.package_id {
                errors.push(LockfileError::PackageMismatch {
                    name: format!("{} (package id)", locked.name),
                    expected: locked.package_id.clone(),
                    found: current.package_id.clone(),
                });
            }
        }

        for current in &plan.packages {
            if self.get_package(&current.name).is_none() {
                errors.push(LockfileError::MissingPackage(current.name.clone()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
