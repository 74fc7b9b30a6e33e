// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files. [`RecipeFile`] mirrors the file as written and is
//! only used by the parser; [`Manifest`] is the validated, typed form that
//! the rest of the resolver works with.

use crate::recipe::options::{OptionDomain, OptionOverride, OptionTarget, OptionValue};
use crate::version::{Version, VersionConstraint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A concrete package identity (`name/version`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: String,
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// The version as an orderable [`Version`]
    pub fn version(&self) -> Version {
        Version::new(self.version.as_str())
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

/// A reference to another package by name and version constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub name: String,
    pub constraint: VersionConstraint,
}

impl Requirement {
    pub fn new(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    /// Whether the given identity satisfies this requirement
    pub fn matches(&self, id: &PackageId) -> bool {
        self.name == id.name && self.constraint.satisfies(&id.version())
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.constraint)
    }
}

/// A parsed, validated recipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub id: PackageId,
    pub license: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    /// Recognized setting names, in declaration order
    pub settings: Vec<String>,
    /// Option name to legal values
    pub options: BTreeMap<String, OptionDomain>,
    /// Values for this recipe's own options
    pub defaults: BTreeMap<String, OptionValue>,
    /// Values this recipe assigns to options of its dependencies
    pub overrides: Vec<OptionOverride>,
    /// Direct requirements, in declaration order
    pub requires: Vec<Requirement>,
    /// Exact versions forced onto requirements with the same name
    pub pins: Vec<Requirement>,
    /// Per-recipe setting values taking precedence over the global ones
    pub setting_overrides: BTreeMap<String, String>,
    /// Output formats requested for the build plan
    pub generators: Vec<String>,
}

impl Manifest {
    /// Start a manifest with only an identity; mostly useful in tests
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: PackageId::new(name, version),
            license: None,
            author: None,
            url: None,
            description: None,
            settings: Vec::new(),
            options: BTreeMap::new(),
            defaults: BTreeMap::new(),
            overrides: Vec::new(),
            requires: Vec::new(),
            pins: Vec::new(),
            setting_overrides: BTreeMap::new(),
            generators: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn version(&self) -> &str {
        &self.id.version
    }

    /// Whether `setting` (or its root, for `compiler.version`) is declared
    pub fn declares_setting(&self, setting: &str) -> bool {
        let root = setting.split('.').next().unwrap_or(setting);
        self.settings.iter().any(|s| s == setting || s == root)
    }

    /// The pin for a package name, if this recipe declares one
    pub fn pin_for(&self, name: &str) -> Option<&Requirement> {
        self.pins.iter().find(|p| p.name == name)
    }

    /// Overrides targeting a dependency (not this recipe itself)
    pub fn dependency_overrides(&self) -> impl Iterator<Item = (&str, &OptionOverride)> {
        self.overrides.iter().filter_map(|o| match &o.target {
            OptionTarget::Package(name) => Some((name.as_str(), o)),
            OptionTarget::SelfPackage => None,
        })
    }
}

/// One string or a list of strings (`generators = "cmake"` or `["cmake", "json"]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

/// An option domain as written: a value list or the `"ANY"` keyword
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDomain {
    Values(Vec<OptionValue>),
    Keyword(String),
}

/// A recipe file as written on disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeFile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: OneOrMany,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub pins: Vec<String>,
    #[serde(default)]
    pub generators: OneOrMany,
    #[serde(default)]
    pub options: BTreeMap<String, RawDomain>,
    #[serde(default)]
    pub default_options: BTreeMap<String, OptionValue>,
    #[serde(default)]
    pub setting_overrides: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_id_display_and_order() {
        let a = PackageId::new("boost", "1.77.0");
        let b = PackageId::new("zlib", "1.2.11");
        assert_eq!(a.to_string(), "boost/1.77.0");
        assert!(a < b);
    }

    #[test]
    fn test_requirement_matches() {
        let req = Requirement::new("zlib", VersionConstraint::parse("[>=1.2 <2]").unwrap());
        assert!(req.matches(&PackageId::new("zlib", "1.2.11")));
        assert!(!req.matches(&PackageId::new("zlib", "2.0")));
        assert!(!req.matches(&PackageId::new("lz4", "1.2.11")));
        assert_eq!(req.to_string(), "zlib/[>=1.2 <2]");
    }

    #[test]
    fn test_declares_subsetting() {
        let mut manifest = Manifest::new("xrpl", "1.8.5");
        manifest.settings = vec!["os".to_string(), "compiler".to_string()];
        assert!(manifest.declares_setting("compiler"));
        assert!(manifest.declares_setting("compiler.version"));
        assert!(!manifest.declares_setting("arch"));
    }
}
