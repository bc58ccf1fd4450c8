// src/version/mod.rs

//! Library versions and version ranges for dependency references
//!
//! Upstream C/C++ projects do not follow semver strictly ("1.1.1q",
//! "2.4.8", "cci.20220101"), so versions are normalized to a semver triple
//! for ordering and fall back to the raw text when the triples tie.
//!
//! References use the `name/version` form, where the version part is either
//! exact (`openssl/1.1.1q`) or a bracketed range (`openssl/[>=1.1 <4]`).

use crate::error::{Error, Result};
use semver::Version as SemVer;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A loosely-structured upstream version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    text: String,
}

impl Version {
    /// Parse a version string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("Empty version".to_string()));
        }
        if s.contains(char::is_whitespace) || s.contains('/') {
            return Err(Error::ParseError(format!("Invalid version '{}'", s)));
        }
        Ok(Self {
            text: s.to_string(),
        })
    }

    /// The version as written
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Normalize to a semver triple using the leading digits of each part
    fn to_semver(&self) -> SemVer {
        if let Ok(v) = SemVer::parse(&self.text) {
            return v;
        }

        let leading = |part: Option<&str>| -> u64 {
            part.map(|p| {
                let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u64>().unwrap_or(0)
            })
            .unwrap_or(0)
        };

        let mut parts = self.text.split(['.', '-', '+']);
        let major = leading(parts.next());
        let minor = leading(parts.next());
        let patch = leading(parts.next());
        SemVer::new(major, minor, patch)
    }

    /// Compare two versions
    pub fn compare(&self, other: &Version) -> Ordering {
        match self.to_semver().cmp(&other.to_semver()) {
            Ordering::Equal => self.text.cmp(&other.text),
            ord => ord,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
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

/// Version requirement on a dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionReq {
    /// Any version is acceptable
    Any,
    /// Exact version match
    Exact(Version),
    /// Greater than
    GreaterThan(Version),
    /// Greater than or equal
    GreaterOrEqual(Version),
    /// Less than
    LessThan(Version),
    /// Less than or equal
    LessOrEqual(Version),
    /// Not equal
    NotEqual(Version),
    /// Both requirements must hold (ranges like `[>=1.1 <4]`)
    And(Box<VersionReq>, Box<VersionReq>),
}

impl VersionReq {
    /// Parse a requirement
    ///
    /// Examples:
    /// - `1.2.3` → Exact(1.2.3)
    /// - `[>=1.1 <4]` → And(>= 1.1, < 4)
    /// - `>= 1.0, < 2.0` → And(>= 1.0, < 2.0)
    /// - `[*]` → Any
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(inner) = s.strip_prefix('[') {
            let inner = inner.strip_suffix(']').ok_or_else(|| {
                Error::ParseError(format!("Unterminated version range '{}'", s))
            })?;
            return Self::parse_terms(inner.split_whitespace(), s);
        }

        if s.is_empty() || s == "*" {
            return Ok(VersionReq::Any);
        }

        if s.contains(',') {
            return Self::parse_terms(s.split(','), s);
        }

        Self::parse_single(s)
    }

    fn parse_terms<'a>(terms: impl Iterator<Item = &'a str>, original: &str) -> Result<Self> {
        let mut parsed: Option<VersionReq> = None;
        for term in terms.map(str::trim).filter(|t| !t.is_empty()) {
            let req = Self::parse_single(term)?;
            parsed = Some(match parsed {
                None => req,
                Some(prev) => VersionReq::And(Box::new(prev), Box::new(req)),
            });
        }
        parsed.ok_or_else(|| Error::ParseError(format!("Empty version range '{}'", original)))
    }

    fn parse_single(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(VersionReq::Any);
        }

        if let Some(rest) = s.strip_prefix(">=") {
            Ok(VersionReq::GreaterOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("<=") {
            Ok(VersionReq::LessOrEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix("!=") {
            Ok(VersionReq::NotEqual(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('>') {
            Ok(VersionReq::GreaterThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('<') {
            Ok(VersionReq::LessThan(Version::parse(rest)?))
        } else if let Some(rest) = s.strip_prefix('=') {
            Ok(VersionReq::Exact(Version::parse(rest)?))
        } else {
            Ok(VersionReq::Exact(Version::parse(s)?))
        }
    }

    /// Check if a version satisfies this requirement
    pub fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionReq::Any => true,
            VersionReq::Exact(v) => version == v,
            VersionReq::GreaterThan(v) => version > v,
            VersionReq::GreaterOrEqual(v) => version >= v,
            VersionReq::LessThan(v) => version < v,
            VersionReq::LessOrEqual(v) => version <= v,
            VersionReq::NotEqual(v) => version != v,
            VersionReq::And(left, right) => left.satisfies(version) && right.satisfies(version),
        }
    }

    /// The pinned version for exact requirements
    pub fn exact(&self) -> Option<&Version> {
        match self {
            VersionReq::Exact(v) => Some(v),
            _ => None,
        }
    }

    /// Render in reference syntax (`1.2.3` or `[>=1.1 <4]`)
    pub fn to_reference(&self) -> String {
        match self {
            VersionReq::Exact(v) => v.to_string(),
            VersionReq::Any => "[*]".to_string(),
            other => format!("[{}]", other.terms().join(" ")),
        }
    }

    fn terms(&self) -> Vec<String> {
        match self {
            VersionReq::Any => vec!["*".to_string()],
            VersionReq::Exact(v) => vec![format!("={}", v)],
            VersionReq::GreaterThan(v) => vec![format!(">{}", v)],
            VersionReq::GreaterOrEqual(v) => vec![format!(">={}", v)],
            VersionReq::LessThan(v) => vec![format!("<{}", v)],
            VersionReq::LessOrEqual(v) => vec![format!("<={}", v)],
            VersionReq::NotEqual(v) => vec![format!("!={}", v)],
            VersionReq::And(left, right) => {
                let mut terms = left.terms();
                terms.extend(right.terms());
                terms
            }
        }
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_reference())
    }
}

/// A `name/version` package reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
    pub version: VersionReq,
}

impl PackageRef {
    /// Parse `name/version` or `name/[range]`
    pub fn parse(s: &str) -> Result<Self> {
        let (name, version) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::ParseError(format!("Reference '{}' must be name/version", s)))?;

        let valid_name = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+'));
        if !valid_name {
            return Err(Error::ParseError(format!(
                "Invalid package name in reference '{}'",
                s
            )));
        }

        Ok(Self {
            name: name.to_string(),
            version: VersionReq::parse(version)?,
        })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version.to_reference())
    }
}
