// src/recipe/options.rs

//! Build options: values, legal domains, and overrides
//!
//! An option domain is declared per recipe (`shared = [true, false]`).
//! Values are checked against the domain when they are assigned, so a bad
//! default or override fails at parse or resolution time rather than when
//! the plan is consumed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Keyword accepted in place of a value list for free-form options
pub const ANY_DOMAIN: &str = "ANY";

/// A single option value as written in a recipe
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl OptionValue {
    /// Canonical text used for domain membership and hashing
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Equality by canonical text, so `true` and `"true"` agree
    pub fn same_as(&self, other: &OptionValue) -> bool {
        self.canonical() == other.canonical()
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// Legal values for one option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionDomain {
    /// One of an enumerated set
    Values(Vec<OptionValue>),
    /// Any value is accepted
    Any,
}

impl OptionDomain {
    /// Check whether a value is legal for this option
    pub fn contains(&self, value: &OptionValue) -> bool {
        match self {
            Self::Any => true,
            Self::Values(values) => values.iter().any(|v| v.same_as(value)),
        }
    }
}

impl fmt::Display for OptionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str(ANY_DOMAIN),
            Self::Values(values) => {
                let items: Vec<String> = values.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

/// Package an override applies to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionTarget {
    /// The declaring recipe itself
    SelfPackage,
    /// A transitive dependency, by package name
    Package(String),
}

impl fmt::Display for OptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfPackage => f.write_str("self"),
            Self::Package(name) => f.write_str(name),
        }
    }
}

/// An option value declared by a recipe for itself or a dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionOverride {
    pub target: OptionTarget,
    pub option: String,
    pub value: OptionValue,
}

impl OptionOverride {
    /// The key as it appears under `[default_options]`
    pub fn key(&self) -> String {
        match &self.target {
            OptionTarget::SelfPackage => self.option.clone(),
            OptionTarget::Package(name) => format!("{}:{}", name, self.option),
        }
    }
}

impl fmt::Display for OptionOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_membership() {
        let domain = OptionDomain::Values(vec![true.into(), false.into()]);
        assert!(domain.contains(&OptionValue::Bool(true)));
        assert!(domain.contains(&OptionValue::Str("false".to_string())));
        assert!(!domain.contains(&OptionValue::Str("maybe".to_string())));
        assert!(!domain.contains(&OptionValue::Int(1)));
    }

    #[test]
    fn test_any_domain() {
        assert!(OptionDomain::Any.contains(&OptionValue::Str("address".to_string())));
        assert_eq!(OptionDomain::Any.to_string(), "ANY");
    }

    #[test]
    fn test_untagged_values() {
        let parsed: Vec<OptionValue> = toml::from_str::<toml::Table>("v = [true, 3, \"x\"]")
            .unwrap()["v"]
            .clone()
            .try_into()
            .unwrap();
        assert_eq!(
            parsed,
            vec![
                OptionValue::Bool(true),
                OptionValue::Int(3),
                OptionValue::Str("x".to_string())
            ]
        );
    }

    #[test]
    fn test_override_key() {
        let o = OptionOverride {
            target: OptionTarget::Package("rocksdb".to_string()),
            option: "lite".to_string(),
            value: false.into(),
        };
        assert_eq!(o.key(), "rocksdb:lite");
        assert_eq!(o.to_string(), "rocksdb:lite=false");
    }
}
