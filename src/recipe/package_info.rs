// src/recipe/package_info.rs

//! Consumer-facing package metadata
//!
//! Describes how to consume a packaged library: link order, system libraries,
//! defines and components. Written next to the package as `pantry-info.json`.

use crate::error::{Error, Result};
use crate::recipe::format::{DefineDecl, Recipe, SystemLibs};
use crate::recipe::kitchen::plate::PackageLayout;
use crate::recipe::options::ResolvedOptions;
use crate::recipe::requires::DependencyEdge;
use crate::settings::{Os, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File name of the serialized metadata
pub const INFO_FILE: &str = "pantry-info.json";

/// Name of the component synthesized when a recipe declares none
pub const IMPLICIT_COMPONENT: &str = "_default";

/// Metadata for one sub-library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub libs: Vec<String>,
    /// Other components or dependencies (`dep` or `dep::component`)
    pub requires: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_libs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmake_target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_config_name: Option<String>,
}

/// Everything a consumer needs to compile and link against the package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub include_dirs: Vec<String>,
    pub lib_dirs: Vec<String>,
    pub bin_dirs: Vec<String>,
    /// Libraries in link order
    pub libs: Vec<String>,
    pub system_libs: Vec<String>,
    pub defines: Vec<String>,
    pub components: BTreeMap<String, ComponentInfo>,
    /// Final option values (removed options omitted)
    pub options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmake_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmake_target_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkg_config_name: Option<String>,
}

/// Build the metadata for a packaged library
///
/// Component requirements follow the declared edges: a requirement on a
/// dependency whose condition did not hold is dropped. Build-tool
/// dependencies never appear in component requirements.
pub fn emit(
    recipe: &Recipe,
    layout: &PackageLayout,
    options: &ResolvedOptions,
    settings: &Settings,
    edges: &[DependencyEdge],
    version: &str,
) -> Result<PackageInfo> {
    let info = &recipe.info;
    let has_dir = |dir: &str| layout.files.iter().any(|f| f.starts_with(dir));
    let dirs_if = |dir: &str| {
        if has_dir(dir) {
            vec![dir.to_string()]
        } else {
            Vec::new()
        }
    };

    let mut components = BTreeMap::new();
    if info.components.is_empty() {
        components.insert(
            IMPLICIT_COMPONENT.to_string(),
            ComponentInfo {
                libs: info.libs.clone(),
                requires: implicit_requires(edges),
                ..Default::default()
            },
        );
    } else {
        for (name, decl) in &info.components {
            components.insert(
                name.clone(),
                ComponentInfo {
                    libs: decl.libs.clone(),
                    requires: component_requires(recipe, name, &decl.requires, edges)?,
                    system_libs: system_libs_for(&decl.system_libs, settings.os),
                    defines: active_defines(&decl.defines, options, settings),
                    cmake_target_name: decl.cmake_target_name.clone(),
                    pkg_config_name: decl.pkg_config_name.clone(),
                },
            );
        }
    }

    // Component libs are part of the package's link line too
    let mut libs = info.libs.clone();
    for component in info.components.values() {
        for lib in &component.libs {
            if !libs.contains(lib) {
                libs.push(lib.clone());
            }
        }
    }

    let package_info = PackageInfo {
        name: recipe.package.name.clone(),
        version: version.to_string(),
        include_dirs: dirs_if("include"),
        lib_dirs: dirs_if("lib"),
        bin_dirs: dirs_if("bin"),
        libs,
        system_libs: system_libs_for(&info.system_libs, settings.os),
        defines: active_defines(&info.defines, options, settings),
        components,
        options: options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        cmake_file_name: info.cmake_file_name.clone(),
        cmake_target_name: info.cmake_target_name.clone(),
        pkg_config_name: info.pkg_config_name.clone(),
    };

    debug!(
        "Package info for {}: libs={:?} system_libs={:?}",
        package_info.name, package_info.libs, package_info.system_libs
    );
    Ok(package_info)
}

/// Dependency part of a component requirement (`dep` of `dep::component`)
fn required_package(entry: &str) -> &str {
    entry.split_once("::").map_or(entry, |(dep, _)| dep)
}

/// Check that every component requirement names a sibling component or a
/// host requirement of the recipe
pub fn check_component_requires(recipe: &Recipe) -> Result<()> {
    for (name, decl) in &recipe.info.components {
        for entry in &decl.requires {
            if !entry.contains("::") && recipe.info.components.contains_key(entry) {
                continue;
            }
            let dep = required_package(entry);
            if !declares_host(recipe, dep) {
                return Err(Error::ParseError(format!(
                    "component '{}' requires '{}', but '{}' is neither a component nor a declared requirement",
                    name, entry, dep
                )));
            }
        }
    }
    Ok(())
}

fn declares_host(recipe: &Recipe, dep: &str) -> bool {
    recipe
        .requires
        .iter()
        .any(|decl| decl.reference.split('/').next() == Some(dep))
}

/// Requirements of one declared component, limited to emitted host edges
fn component_requires(
    recipe: &Recipe,
    component: &str,
    requires: &[String],
    edges: &[DependencyEdge],
) -> Result<Vec<String>> {
    let mut kept = Vec::new();
    for entry in requires {
        if !entry.contains("::") && recipe.info.components.contains_key(entry) {
            kept.push(entry.clone());
            continue;
        }
        let dep = required_package(entry);
        if edges.iter().any(|e| e.is_host() && e.name == dep) {
            kept.push(entry.clone());
        } else if declares_host(recipe, dep) {
            debug!(
                "Component {} drops requirement {}: dependency not declared for these options",
                component, entry
            );
        } else {
            return Err(Error::ParseError(format!(
                "component '{}' requires '{}', but '{}' is neither a component nor a declared requirement",
                component, entry, dep
            )));
        }
    }
    Ok(kept)
}

/// Host edges marked transitive, or every host edge when none are marked
fn implicit_requires(edges: &[DependencyEdge]) -> Vec<String> {
    let host: Vec<&DependencyEdge> = edges.iter().filter(|e| e.is_host()).collect();
    let marked: Vec<&DependencyEdge> = host.iter().copied().filter(|e| e.is_transitive()).collect();
    let chosen = if marked.is_empty() { host } else { marked };
    chosen.into_iter().map(|e| e.name.clone()).collect()
}

fn system_libs_for(entries: &[SystemLibs], os: Os) -> Vec<String> {
    let mut libs: Vec<String> = Vec::new();
    for entry in entries.iter().filter(|e| e.os.contains(&os)) {
        for lib in &entry.libs {
            if !libs.contains(lib) {
                libs.push(lib.clone());
            }
        }
    }
    libs
}

fn active_defines(decls: &[DefineDecl], options: &ResolvedOptions, settings: &Settings) -> Vec<String> {
    decls
        .iter()
        .filter(|d| d.when.as_ref().is_none_or(|c| c.holds(options, settings)))
        .map(|d| d.define.clone())
        .collect()
}

impl PackageInfo {
    /// Write as pretty JSON into `dir`, returning the file path
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(INFO_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json + "\n")?;
        Ok(path)
    }

    /// Read previously written metadata
    pub fn read_from(dir: &Path) -> Result<Self> {
        let content = fs::read_to_string(dir.join(INFO_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }
}
