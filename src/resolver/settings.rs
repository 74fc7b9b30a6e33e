// src/resolver/settings.rs

//! Settings propagation
//!
//! Every package receives the full global settings map with its own
//! recipe's `setting_overrides` layered on top. A recipe may only override
//! settings it declares; nodes never see each other's overrides.

use super::graph::DependencyGraph;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Global build settings (`os=Linux`, `compiler.version=13`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(BTreeMap<String, String>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of `key=value` pairs; later pairs win
    pub fn from_pairs<I, T>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut settings = Self::new();
        for pair in pairs {
            let (key, value) = parse_pair(pair.as_ref())?;
            settings.set(key, value);
        }
        Ok(settings)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Layer `other` on top of these settings
    pub fn merge(&mut self, other: &Settings) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl From<BTreeMap<String, String>> for Settings {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl FromStr for Settings {
    type Err = Error;

    /// Comma-separated pairs: `os=Linux,arch=x86_64`
    fn from_str(s: &str) -> Result<Self> {
        Self::from_pairs(s.split(',').map(str::trim).filter(|p| !p.is_empty()))
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// Split one `key=value` pair
pub fn parse_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(Error::Config(format!(
            "invalid setting `{}`, expected KEY=VALUE",
            pair
        ))),
    }
}

/// Compute every node's effective settings
pub fn apply(mut graph: DependencyGraph, settings: &Settings) -> Result<DependencyGraph> {
    for node in graph.nodes_mut() {
        let manifest = &node.manifest;
        let mut effective = settings.as_map().clone();

        for (key, value) in &manifest.setting_overrides {
            if !manifest.declares_setting(key) {
                return Err(Error::UnrecognizedSetting {
                    package: manifest.id.clone(),
                    setting: key.clone(),
                });
            }
            debug!("{} overrides {}={}", manifest.id, key, value);
            effective.insert(key.clone(), value.clone());
        }

        node.settings = effective;
    }

    graph.set_settings(settings.as_map().clone());
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{Manifest, PackageId};
    use crate::resolver::graph::tests::graph;
    use std::sync::Arc;

    fn override_setting(g: &mut DependencyGraph, id: &PackageId, declared: &[&str], key: &str, value: &str) {
        let node = g.node_mut(id).unwrap();
        let mut manifest: Manifest = (*node.manifest).clone();
        manifest.settings = declared.iter().map(ToString::to_string).collect();
        manifest
            .setting_overrides
            .insert(key.to_string(), value.to_string());
        node.manifest = Arc::new(manifest);
    }

    #[test]
    fn test_parse_pairs() {
        let settings = Settings::from_pairs(["os=Linux", "build_type = Release", "os=Macos"]).unwrap();
        assert_eq!(settings.get("os"), Some("Macos"));
        assert_eq!(settings.get("build_type"), Some("Release"));
        assert!(Settings::from_pairs(["os"]).is_err());
        assert!(Settings::from_pairs(["=Linux"]).is_err());

        let parsed: Settings = "arch=x86_64, os=Linux".parse().unwrap();
        assert_eq!(parsed.to_string(), "arch=x86_64,os=Linux");
    }

    #[test]
    fn test_global_settings_reach_every_node() {
        let g = graph(&[("r/1", &["a/1"]), ("a/1", &["b/1"])]);
        let settings = Settings::from_pairs(["os=Linux", "arch=x86_64"]).unwrap();
        let g = apply(g, &settings).unwrap();
        for node in g.nodes() {
            assert_eq!(&node.settings, settings.as_map());
        }
        assert_eq!(g.settings(), settings.as_map());
    }

    #[test]
    fn test_override_is_local_to_its_node() {
        let mut g = graph(&[("r/1", &["a/1"]), ("a/1", &["b/1"])]);
        override_setting(&mut g, &PackageId::new("a", "1"), &["build_type"], "build_type", "Debug");

        let settings = Settings::from_pairs(["build_type=Release"]).unwrap();
        let g = apply(g, &settings).unwrap();
        let setting = |id: &str| {
            g.node(&PackageId::new(id, "1")).unwrap().settings["build_type"].clone()
        };
        assert_eq!(setting("r"), "Release");
        assert_eq!(setting("a"), "Debug");
        assert_eq!(setting("b"), "Release");
    }

    #[test]
    fn test_sub_setting_override() {
        let mut g = graph(&[("r/1", &[])]);
        let root = g.root().clone();
        override_setting(&mut g, &root, &["compiler"], "compiler.version", "13");
        let g = apply(g, &Settings::new()).unwrap();
        assert_eq!(g.root_node().unwrap().settings["compiler.version"], "13");
    }

    #[test]
    fn test_undeclared_override() {
        let mut g = graph(&[("r/1", &["a/1"])]);
        override_setting(&mut g, &PackageId::new("a", "1"), &["os"], "arch", "armv8");
        let err = apply(g, &Settings::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnrecognizedSetting { ref package, ref setting }
                if package == &PackageId::new("a", "1") && setting == "arch"
        ));
    }
}
