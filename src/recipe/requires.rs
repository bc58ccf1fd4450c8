// src/recipe/requires.rs

//! Dependency declaration
//!
//! Given resolved options and settings, decides which other libraries this
//! one depends on. Runs the recipe's validation rules first so that an
//! unbuildable configuration is rejected before anything is fetched.

use crate::error::{Error, Result};
use crate::recipe::format::{Recipe, RequirementDecl};
use crate::recipe::options::{OptionValue, ResolvedOptions};
use crate::settings::Settings;
use crate::version::{PackageRef, Version, VersionReq};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Where a dependency is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyContext {
    /// Linked into (or included by) this library
    Host,
    /// Build tool, never visible to consumers
    Build,
}

/// One declared dependency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyEdge {
    pub name: String,
    #[serde(serialize_with = "serialize_req")]
    pub version: VersionReq,
    pub context: DependencyContext,
    pub transitive_headers: bool,
    pub transitive_libs: bool,
    /// Options requested on the dependency
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionValue>,
    /// Capability this dependency provides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provides: Option<String>,
    /// Option whose value caused this edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn serialize_req<S: Serializer>(req: &VersionReq, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&req.to_reference())
}

impl DependencyEdge {
    fn from_decl(decl: &RequirementDecl, context: DependencyContext) -> Result<Self> {
        let reference = PackageRef::parse(&decl.reference)?;
        Ok(Self {
            name: reference.name,
            version: reference.version,
            context,
            transitive_headers: decl.transitive_headers,
            transitive_libs: decl.transitive_libs,
            options: decl.options.clone(),
            provides: decl.provides.clone(),
            reason: decl
                .when
                .as_ref()
                .and_then(|c| c.referenced_option())
                .map(str::to_string),
        })
    }

    pub fn is_host(&self) -> bool {
        self.context == DependencyContext::Host
    }

    /// Propagates to consumers of this package
    pub fn is_transitive(&self) -> bool {
        self.transitive_headers || self.transitive_libs
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version.to_reference())?;
        if self.context == DependencyContext::Build {
            write!(f, " (build)")?;
        }
        Ok(())
    }
}

/// Reject unbuildable option/setting combinations
///
/// Checks `[[invalid]]` rules, then minimum compiler version and C++
/// standard. Every failure is a configuration error.
pub fn validate(recipe: &Recipe, options: &ResolvedOptions, settings: &Settings) -> Result<()> {
    for rule in &recipe.invalid {
        if rule.when.holds(options, settings) {
            return Err(Error::invalid(format!(
                "{} ({})",
                rule.message,
                rule.when.describe()
            )));
        }
    }

    let compiler = match &settings.compiler {
        Some(c) => c,
        None => return Ok(()),
    };

    if let Some(minimum) = recipe.compiler_minimum.for_compiler(compiler.name) {
        let minimum = Version::parse(minimum)?;
        match compiler.parsed_version() {
            Some(actual) if actual < minimum => {
                return Err(Error::invalid(format!(
                    "{} requires {} >= {} (compiler.version={})",
                    recipe.package.name, compiler.name, minimum, compiler.version
                )));
            }
            _ => {}
        }
    }

    if let (Some(min_std), Some(cppstd)) = (&recipe.compiler_minimum.min_cppstd, &compiler.cppstd) {
        if cppstd_rank(cppstd) < cppstd_rank(min_std) {
            return Err(Error::invalid(format!(
                "{} requires C++{} or newer (compiler.cppstd={})",
                recipe.package.name, min_std, cppstd
            )));
        }
    }

    Ok(())
}

/// Order C++ standards, treating `gnu17` like `17` and `98` as oldest
///
/// Draft names rank as the standard they became (`2a` is `20`).
fn cppstd_rank(std: &str) -> u32 {
    let std = std.strip_prefix("gnu").unwrap_or(std);
    match std {
        "98" | "03" => 3,
        "0x" => 11,
        "1y" => 14,
        "1z" => 17,
        "2a" => 20,
        "2b" => 23,
        "2c" => 26,
        other => other.parse().unwrap_or(0),
    }
}

/// Declare dependencies for resolved options
///
/// Host edges come first in declaration order, then build-tool edges.
pub fn declare(
    recipe: &Recipe,
    options: &ResolvedOptions,
    settings: &Settings,
) -> Result<Vec<DependencyEdge>> {
    validate(recipe, options, settings)?;

    let mut edges = Vec::new();
    let groups = [
        (&recipe.requires, DependencyContext::Host),
        (&recipe.tool_requires, DependencyContext::Build),
    ];
    for (decls, context) in groups {
        for decl in decls {
            let applies = decl
                .when
                .as_ref()
                .is_none_or(|cond| cond.holds(options, settings));
            if applies {
                let edge = DependencyEdge::from_decl(decl, context)?;
                debug!("Dependency: {}", edge);
                edges.push(edge);
            }
        }
    }

    check_capabilities(&edges)?;
    check_version_conflicts(&edges)?;

    Ok(edges)
}

/// Two enabled dependencies providing the same capability is an error
fn check_capabilities(edges: &[DependencyEdge]) -> Result<()> {
    let mut providers: BTreeMap<&str, &DependencyEdge> = BTreeMap::new();
    for edge in edges.iter().filter(|e| e.is_host()) {
        let capability = match &edge.provides {
            Some(c) => c.as_str(),
            None => continue,
        };
        if let Some(first) = providers.insert(capability, edge) {
            let describe = |e: &DependencyEdge| match &e.reason {
                Some(option) => format!("{} (option '{}')", e.name, option),
                None => e.name.clone(),
            };
            return Err(Error::invalid(format!(
                "both {} and {} provide '{}'; enable only one of them",
                describe(first),
                describe(edge),
                capability
            )));
        }
    }
    Ok(())
}

/// The same package pinned to two different exact versions is an error
fn check_version_conflicts(edges: &[DependencyEdge]) -> Result<()> {
    let mut pinned: BTreeMap<(&str, DependencyContext), &Version> = BTreeMap::new();
    for edge in edges {
        if let Some(version) = edge.version.exact() {
            if let Some(previous) = pinned.insert((edge.name.as_str(), edge.context), version) {
                if previous != version {
                    return Err(Error::invalid(format!(
                        "{} is required as both {} and {}",
                        edge.name, previous, version
                    )));
                }
            }
        }
    }
    Ok(())
}
