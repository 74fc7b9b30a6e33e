// src/version/mod.rs

//! Version handling and constraint satisfaction for recipe requirements
//!
//! Native upstream versions are rarely semver (`1.1.1m`, `2.4.6`, `13.6`),
//! so ordering falls back to a segment comparison when either side does not
//! parse as semver. Requirements use exact pins (`zlib/1.2.11`), bracketed
//! ranges (`zlib/[>=1.2 <2]`) or the wildcard (`zlib/*`).

use crate::error::{Error, Result};
use semver::Version as SemVer;
use std::cmp::Ordering;
use std::fmt;

/// An upstream version string with a total ordering
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    text: String,
}

/// One segment of a non-semver version
#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Numeric(u64),
    Alpha(&'a str),
}

impl Version {
    /// Wrap a version string (surrounding whitespace is dropped)
    pub fn new(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self {
            text: text.trim().to_string(),
        }
    }

    /// The version text as written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    fn to_semver(&self) -> Option<SemVer> {
        SemVer::parse(&self.text).ok()
    }

    /// Split into alternating numeric and alphabetic runs
    fn segments(&self) -> Vec<Segment<'_>> {
        let mut segments = Vec::new();
        for part in self.text.split(['.', '-', '_', '+']) {
            let bytes = part.as_bytes();
            let mut start = 0;
            while start < bytes.len() {
                let numeric = bytes[start].is_ascii_digit();
                let mut end = start;
                while end < bytes.len() && bytes[end].is_ascii_digit() == numeric {
                    end += 1;
                }
                let run = &part[start..end];
                segments.push(if numeric {
                    // Overlong numeric runs saturate rather than fail
                    Segment::Numeric(run.parse().unwrap_or(u64::MAX))
                } else {
                    Segment::Alpha(run)
                });
                start = end;
            }
        }
        segments
    }

    /// Compare two versions
    pub fn compare(&self, other: &Version) -> Ordering {
        if let (Some(a), Some(b)) = (self.to_semver(), other.to_semver()) {
            return a.cmp(&b);
        }

        let left = self.segments();
        let right = other.segments();
        for (l, r) in left.iter().zip(right.iter()) {
            let ord = match (l, r) {
                (Segment::Numeric(a), Segment::Numeric(b)) => a.cmp(b),
                (Segment::Alpha(a), Segment::Alpha(b)) => a.cmp(b),
                // A numeric segment is newer than an alphabetic one
                (Segment::Numeric(_), Segment::Alpha(_)) => Ordering::Greater,
                (Segment::Alpha(_), Segment::Numeric(_)) => Ordering::Less,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }

        match left.len().cmp(&right.len()) {
            Ordering::Equal => self.text.cmp(&other.text),
            ord => ord,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Comparison operators allowed inside a bracketed range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    NotEq,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    /// `~1.2`: at least 1.2, same major and minor
    Tilde,
    /// `^1.2`: at least 1.2, same major
    Caret,
}

impl Op {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Greater => ">",
            Self::GreaterEq => ">=",
            Self::Less => "<",
            Self::LessEq => "<=",
            Self::Tilde => "~",
            Self::Caret => "^",
        }
    }
}

/// A single `<op><version>` term of a range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparator {
    pub op: Op,
    pub version: Version,
}

impl Comparator {
    fn parse(term: &str) -> Option<Self> {
        // Longer operators first
        let table = [
            (">=", Op::GreaterEq),
            ("<=", Op::LessEq),
            ("!=", Op::NotEq),
            (">", Op::Greater),
            ("<", Op::Less),
            ("=", Op::Eq),
            ("~", Op::Tilde),
            ("^", Op::Caret),
        ];
        let (op, rest) = table
            .iter()
            .find_map(|(prefix, op)| term.strip_prefix(prefix).map(|rest| (*op, rest)))
            .unwrap_or((Op::Eq, term));
        let rest = rest.trim();
        if rest.is_empty() || rest.contains(char::is_whitespace) {
            return None;
        }
        Some(Self {
            op,
            version: Version::new(rest),
        })
    }

    fn matches(&self, version: &Version) -> bool {
        let ord = version.compare(&self.version);
        match self.op {
            Op::Eq => ord == Ordering::Equal,
            Op::NotEq => ord != Ordering::Equal,
            Op::Greater => ord == Ordering::Greater,
            Op::GreaterEq => ord != Ordering::Less,
            Op::Less => ord == Ordering::Less,
            Op::LessEq => ord != Ordering::Greater,
            Op::Tilde => ord != Ordering::Less && self.same_prefix(version, 2),
            Op::Caret => ord != Ordering::Less && self.same_prefix(version, 1),
        }
    }

    /// Whether the leading `depth` dot-separated parts agree
    fn same_prefix(&self, version: &Version, depth: usize) -> bool {
        let ours: Vec<&str> = self.version.as_str().split('.').take(depth).collect();
        let theirs: Vec<&str> = version.as_str().split('.').take(depth).collect();
        ours == theirs
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.version)
    }
}

/// A requirement's acceptable versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Any version is acceptable
    Any,
    /// Exactly this version text
    Exact(Version),
    /// Every comparator must hold
    Range(Vec<Comparator>),
}

impl VersionConstraint {
    /// Parse the part of a requirement after the `/`
    ///
    /// Examples:
    /// - "1.2.11" → Exact(1.2.11)
    /// - "[>=1.2 <2]" → Range(>=1.2, <2)
    /// - "[>=1.2, <2]" → Range(>=1.2, <2)
    /// - "*" or "[*]" → Any
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::MalformedManifest {
                manifest: "<requirement>".to_string(),
                field: "constraint".to_string(),
                reason: "empty version constraint".to_string(),
            });
        }

        if s == "*" {
            return Ok(Self::Any);
        }

        let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) else {
            if s.contains(['[', ']']) || s.contains(char::is_whitespace) {
                return Err(range_error(s, "unbalanced brackets or stray whitespace"));
            }
            return Ok(Self::Exact(Version::new(s)));
        };

        let inner = inner.trim();
        if inner == "*" {
            return Ok(Self::Any);
        }

        let comparators = inner
            .split([',', ' '])
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| Comparator::parse(term).ok_or_else(|| range_error(s, term)))
            .collect::<Result<Vec<_>>>()?;

        if comparators.is_empty() {
            return Err(range_error(s, "empty range"));
        }

        Ok(Self::Range(comparators))
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(v) => v.as_str() == version.as_str(),
            Self::Range(comparators) => comparators.iter().all(|c| c.matches(version)),
        }
    }

    /// Whether this constraint names exactly one version
    pub fn exact(&self) -> Option<&Version> {
        match self {
            Self::Exact(v) => Some(v),
            _ => None,
        }
    }

    /// Pick the highest version from `available` that satisfies this constraint
    pub fn best_match<'a, I>(&self, available: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        available.into_iter().filter(|v| self.satisfies(v)).max()
    }
}

fn range_error(constraint: &str, detail: &str) -> Error {
    Error::MalformedManifest {
        manifest: "<requirement>".to_string(),
        field: "constraint".to_string(),
        reason: format!("invalid version range `{}`: {}", constraint, detail),
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "{}", v),
            Self::Range(comparators) => {
                let terms: Vec<String> = comparators.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", terms.join(" "))
            }
        }
    }
}
