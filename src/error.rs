// src/error.rs

//! Error types for recipe parsing, resolution and plan emission
//!
//! Every failure aborts the whole resolution run. Errors fall into four
//! classes (see [`ErrorKind`]): input errors attributable to one manifest,
//! resolution errors attributable to two or more requirement chains,
//! collaborator errors from a recipe source, and internal invariant
//! violations.

use crate::recipe::PackageId;
use crate::resolver::conflict::{OverrideChain, RequestChain};
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad manifest or configuration data; never retried
    Input,
    /// Manifests that cannot be combined into one plan
    Resolution,
    /// Recipe source failures
    Collaborator,
    /// A defect in the resolver itself
    Internal,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed manifest {manifest}: field `{field}`: {reason}")]
    MalformedManifest {
        manifest: String,
        field: String,
        reason: String,
    },

    #[error("invalid option value in {manifest}: field `{field}`: {reason}")]
    InvalidOptionValue {
        manifest: String,
        field: String,
        reason: String,
    },

    #[error(
        "duplicate requirement in {manifest}: `{package}` required as both {first} and {second} \
         (add a pin to choose one)"
    )]
    DuplicateRequirement {
        manifest: String,
        package: String,
        first: String,
        second: String,
    },

    #[error("{package} overrides setting `{setting}` which it does not declare")]
    UnrecognizedSetting { package: PackageId, setting: String },

    #[error(
        "version conflict for `{package}`:\n  {}",
        join_display(.requests, "\n  ")
    )]
    VersionConflict {
        package: String,
        requests: Vec<RequestChain>,
    },

    #[error(
        "option conflict for `{package}:{option}`:\n  {}",
        join_display(.assignments, "\n  ")
    )]
    OptionConflict {
        package: String,
        option: String,
        assignments: Vec<OverrideChain>,
    },

    #[error(
        "circular dependency: {}",
        join_display(.cycle, " -> ")
    )]
    CyclicDependency { cycle: Vec<PackageId> },

    #[error("no recipe found for {name}/{constraint}")]
    RecipeNotFound { name: String, constraint: String },

    #[error("failed to fetch recipe {name}/{constraint}: {reason}")]
    FetchFailed {
        name: String,
        constraint: String,
        reason: String,
        transient: bool,
    },

    #[error("no prebuilt artifact for {package} ({package_id})")]
    ArtifactUnavailable { package: PackageId, package_id: String },

    #[error("incomplete graph at {package}: {reason}")]
    IncompleteGraph { package: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to serialize {what}: {reason}")]
    Serialization { what: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_display<T: std::fmt::Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedManifest { .. }
            | Self::InvalidOptionValue { .. }
            | Self::DuplicateRequirement { .. }
            | Self::UnrecognizedSetting { .. }
            | Self::Config(_) => ErrorKind::Input,
            Self::VersionConflict { .. }
            | Self::OptionConflict { .. }
            | Self::CyclicDependency { .. } => ErrorKind::Resolution,
            Self::RecipeNotFound { .. }
            | Self::FetchFailed { .. }
            | Self::ArtifactUnavailable { .. }
            | Self::Io(_) => ErrorKind::Collaborator,
            Self::IncompleteGraph { .. } | Self::Serialization { .. } => ErrorKind::Internal,
        }
    }

    /// Whether retrying the failed operation may succeed
    ///
    /// Only transient fetch failures qualify. A definitive not-found answer
    /// is never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::FetchFailed { transient: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = Error::RecipeNotFound {
            name: "zlib".to_string(),
            constraint: "1.2.11".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Collaborator);
        assert!(!err.is_transient());

        let err = Error::IncompleteGraph {
            package: "zlib".to_string(),
            reason: "missing child".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_only_transient_fetches_retry() {
        let transient = Error::FetchFailed {
            name: "boost".to_string(),
            constraint: "1.77.0".to_string(),
            reason: "connection reset".to_string(),
            transient: true,
        };
        let definitive = Error::FetchFailed {
            name: "boost".to_string(),
            constraint: "1.77.0".to_string(),
            reason: "HTTP 403".to_string(),
            transient: false,
        };
        assert!(transient.is_transient());
        assert!(!definitive.is_transient());
    }

    #[test]
    fn test_cycle_display() {
        let err = Error::CyclicDependency {
            cycle: vec![
                PackageId::new("a", "1.0"),
                PackageId::new("b", "1.0"),
                PackageId::new("a", "1.0"),
            ],
        };
        assert_eq!(err.to_string(), "circular dependency: a/1.0 -> b/1.0 -> a/1.0");
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }
}
