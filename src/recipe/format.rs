// src/recipe/format.rs

//! Recipe file format definitions
//!
//! Recipes are TOML files that describe how to fetch, configure, build and
//! package one C/C++ library. Everything is declarative: option-dependent
//! behavior is expressed with `when` conditions instead of code.

use crate::error::{Error, Result};
use crate::recipe::build_system::{BuildSystem, FlagStyle};
use crate::recipe::condition::Condition;
use crate::recipe::options::{OptionDomain, OptionValue};
use crate::settings::{CompilerName, Os, Settings};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// A complete recipe for one library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    /// Package metadata
    pub package: PackageSection,

    /// Source archive per upstream version
    #[serde(default)]
    pub sources: BTreeMap<String, SourceSection>,

    /// Ordered patch list per upstream version
    #[serde(default)]
    pub patches: BTreeMap<String, Vec<PatchInfo>>,

    /// Declared options
    #[serde(default)]
    pub options: BTreeMap<String, OptionDecl>,

    /// Host dependencies (libraries linked into this one)
    #[serde(default)]
    pub requires: Vec<RequirementDecl>,

    /// Build tools needed only while building
    #[serde(default)]
    pub tool_requires: Vec<RequirementDecl>,

    /// Option/setting combinations that cannot be built
    #[serde(default)]
    pub invalid: Vec<InvalidRule>,

    /// Minimum compiler versions and C++ standard
    #[serde(default)]
    pub compiler_minimum: CompilerMinimum,

    /// Build instructions
    #[serde(default)]
    pub build: BuildSection,

    /// Packaging rules
    #[serde(default)]
    pub package_files: PackageFiles,

    /// Consumer-facing metadata
    #[serde(default)]
    pub info: InfoSection,

    /// Variables for substitution
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Directory the recipe was loaded from (relative patch and source paths)
    #[serde(skip)]
    pub recipe_dir: Option<PathBuf>,
}

impl Recipe {
    /// Substitute variables in a string
    ///
    /// Replaces `%(name)s` patterns with:
    /// 1. Built-in variables (`name`, `version`)
    /// 2. Custom variables from the [variables] section
    pub fn substitute(&self, template: &str, version: &str) -> String {
        let mut result = template.to_string();

        result = result.replace("%(version)s", version);
        result = result.replace("%(name)s", &self.package.name);

        for (key, value) in &self.variables {
            result = result.replace(&format!("%({})s", key), value);
        }

        result
    }

    /// Source declaration for a version
    pub fn source_for(&self, version: &str) -> Result<&SourceSection> {
        self.sources.get(version).ok_or_else(|| {
            Error::NotFound(format!(
                "No source declared for {} version {} (known: {})",
                self.package.name,
                version,
                self.versions().join(", ")
            ))
        })
    }

    /// Patches for a version, in application order
    pub fn patches_for(&self, version: &str) -> &[PatchInfo] {
        self.patches.get(version).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Archive URL with variables substituted
    pub fn archive_url(&self, version: &str) -> Result<String> {
        let source = self.source_for(version)?;
        Ok(self.substitute(&source.url, version))
    }

    /// Archive filename from the URL (or the explicit `filename`)
    pub fn archive_filename(&self, version: &str) -> Result<String> {
        let source = self.source_for(version)?;
        if let Some(name) = &source.filename {
            return Ok(self.substitute(name, version));
        }
        let url = self.archive_url(version)?;
        let name = url
            .split(['?', '#'])
            .next()
            .unwrap_or(&url)
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("source.tar.gz");
        Ok(name.to_string())
    }

    /// Declared versions, oldest first
    pub fn versions(&self) -> Vec<&str> {
        let mut versions: Vec<&str> = self.sources.keys().map(String::as_str).collect();
        versions.sort_by(|a, b| match (Version::parse(a), Version::parse(b)) {
            (Ok(va), Ok(vb)) => va.cmp(&vb),
            _ => a.cmp(b),
        });
        versions
    }

    pub fn is_header_only(&self) -> bool {
        self.package.package_type == PackageType::HeaderLibrary
    }

    /// Settings as seen by this recipe
    ///
    /// Plain C libraries ignore the C++ standard and runtime.
    pub fn effective_settings(&self, settings: &Settings) -> Settings {
        match self.package.language {
            Language::C => settings.without_cpp_subsettings(),
            Language::Cpp => settings.clone(),
        }
    }
}

/// Package metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageSection {
    /// Package name
    pub name: String,

    /// Default upstream version
    pub version: String,

    /// Short description
    #[serde(default)]
    pub description: Option<String>,

    /// License identifier (SPDX)
    #[serde(default)]
    pub license: Option<String>,

    /// Homepage URL
    #[serde(default)]
    pub homepage: Option<String>,

    #[serde(default)]
    pub topics: Vec<String>,

    #[serde(default)]
    pub package_type: PackageType,

    #[serde(default)]
    pub language: Language,
}

/// What kind of artifact the recipe produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackageType {
    #[default]
    Library,
    HeaderLibrary,
    Application,
}

/// Implementation language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[default]
    Cpp,
}

/// Source archive for one version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSection {
    /// Archive URL, local path or `file://` URL
    ///
    /// Supports `%(version)s` substitution.
    pub url: String,

    /// Checksum for the archive (sha256:...)
    pub checksum: String,

    /// Drop the single top-level directory when extracting
    #[serde(default = "default_true")]
    pub strip_root: bool,

    /// Archive filename override when the URL has no usable basename
    #[serde(default)]
    pub filename: Option<String>,
}

/// Information about a single patch
///
/// Exactly one of `file` and `replace` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchInfo {
    /// Patch file URL or path relative to the recipe
    #[serde(default)]
    pub file: Option<String>,

    /// In-place text replacement
    #[serde(default)]
    pub replace: Option<ReplaceSpec>,

    /// Checksum for remote patches
    #[serde(default)]
    pub checksum: Option<String>,

    /// Strip level for patch (default: 1)
    #[serde(default = "default_strip")]
    pub strip: u32,

    #[serde(default)]
    pub description: Option<String>,

    /// Abort the cook when the patch does not apply
    #[serde(default = "default_true")]
    pub strict: bool,
}

impl PatchInfo {
    /// Short label for logs
    pub fn label(&self) -> String {
        if let Some(desc) = &self.description {
            return desc.clone();
        }
        match (&self.file, &self.replace) {
            (Some(file), _) => file.clone(),
            (None, Some(r)) => format!("replace in {}", r.file),
            (None, None) => "<empty patch>".to_string(),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.file
            .as_deref()
            .is_some_and(|f| f.starts_with("http://") || f.starts_with("https://"))
    }
}

/// Text replacement inside one source file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceSpec {
    /// Path relative to the source root
    pub file: String,
    pub search: String,
    pub with: String,
    /// Treat `search` as a regular expression
    #[serde(default)]
    pub regex: bool,
}

fn default_strip() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// Declaration of one option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDecl {
    /// Allowed values: `[true, false]`, an enumerated list, or `"ANY"`
    pub values: OptionDomain,

    pub default: OptionValue,

    /// Operating systems where the option does not exist
    #[serde(default)]
    pub exclude_os: Vec<Os>,

    /// If set, the option only exists on these operating systems
    #[serde(default)]
    pub only_os: Vec<Os>,

    /// Remove the option when any of these conditions holds
    #[serde(default)]
    pub remove_when: Vec<Condition>,

    #[serde(default)]
    pub description: Option<String>,
}

/// One declared dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequirementDecl {
    /// `name/version` or `name/[range]`
    #[serde(rename = "ref")]
    pub reference: String,

    /// Only declared when this holds
    #[serde(default)]
    pub when: Option<Condition>,

    /// Capability this dependency provides (e.g. "tls")
    #[serde(default)]
    pub provides: Option<String>,

    /// Consumers need this dependency's headers too
    #[serde(default)]
    pub transitive_headers: bool,

    /// Consumers link this dependency too
    #[serde(default)]
    pub transitive_libs: bool,

    /// Options requested on the dependency
    #[serde(default)]
    pub options: BTreeMap<String, OptionValue>,
}

/// Combination rejected before any build work starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidRule {
    pub when: Condition,
    pub message: String,
}

/// Minimum compiler versions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilerMinimum {
    #[serde(default)]
    pub gcc: Option<String>,
    #[serde(default)]
    pub clang: Option<String>,
    #[serde(default, rename = "apple-clang")]
    pub apple_clang: Option<String>,
    #[serde(default)]
    pub msvc: Option<String>,
    #[serde(default, rename = "intel-cc")]
    pub intel_cc: Option<String>,
    /// Minimum C++ standard (e.g. "14")
    #[serde(default)]
    pub min_cppstd: Option<String>,
}

impl CompilerMinimum {
    pub fn for_compiler(&self, name: CompilerName) -> Option<&str> {
        match name {
            CompilerName::Gcc => self.gcc.as_deref(),
            CompilerName::Clang => self.clang.as_deref(),
            CompilerName::AppleClang => self.apple_clang.as_deref(),
            CompilerName::Msvc => self.msvc.as_deref(),
            CompilerName::IntelCc => self.intel_cc.as_deref(),
        }
    }
}

/// Build instructions section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSection {
    /// Underlying build system
    #[serde(default)]
    pub system: BuildSystem,

    /// Extra configure arguments
    ///
    /// Supports `%(variable)s` substitution.
    #[serde(default)]
    pub args: Vec<String>,

    /// Option to native flag mapping
    #[serde(default)]
    pub flags: Vec<BuildFlag>,

    /// Fixed build-system variables
    #[serde(default)]
    pub variables: BTreeMap<String, OptionValue>,

    /// Environment variables to set during build
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Option that enables the upstream self-test
    #[serde(default)]
    pub test_option: Option<String>,

    /// Working directory within source (relative path)
    #[serde(default)]
    pub subdir: Option<String>,

    /// Number of parallel jobs (default: kitchen setting)
    #[serde(default)]
    pub jobs: Option<u32>,
}

/// Mapping of one option to a native build flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildFlag {
    pub option: String,

    /// Native name (defaults to the option name)
    #[serde(default)]
    pub variable: Option<String>,

    #[serde(default)]
    pub style: FlagStyle,

    /// Only emitted when this holds
    #[serde(default)]
    pub when: Option<Condition>,
}

impl BuildFlag {
    pub fn variable_name(&self) -> &str {
        self.variable.as_deref().unwrap_or(&self.option)
    }
}

/// Packaging rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageFiles {
    /// License file globs, relative to the source root
    #[serde(default = "default_licenses")]
    pub licenses: Vec<String>,

    /// Paths that must exist in the package
    #[serde(default)]
    pub expected: Vec<String>,

    /// Residue globs removed from the package
    #[serde(default = "default_remove")]
    pub remove: Vec<String>,
}

impl Default for PackageFiles {
    fn default() -> Self {
        Self {
            licenses: default_licenses(),
            expected: Vec::new(),
            remove: default_remove(),
        }
    }
}

fn default_licenses() -> Vec<String> {
    ["LICENSE*", "LICENCE*", "COPYING*"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_remove() -> Vec<String> {
    ["lib/pkgconfig", "lib/cmake", "share", "**/*.la", "**/*.pdb"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Consumer-facing metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoSection {
    /// Libraries in link order
    #[serde(default)]
    pub libs: Vec<String>,

    #[serde(default)]
    pub defines: Vec<DefineDecl>,

    #[serde(default)]
    pub system_libs: Vec<SystemLibs>,

    #[serde(default)]
    pub components: BTreeMap<String, ComponentDecl>,

    #[serde(default)]
    pub cmake_file_name: Option<String>,

    #[serde(default)]
    pub cmake_target_name: Option<String>,

    #[serde(default)]
    pub pkg_config_name: Option<String>,
}

/// Preprocessor define exported to consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefineDecl {
    pub define: String,
    #[serde(default)]
    pub when: Option<Condition>,
}

/// System libraries needed on some operating systems
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemLibs {
    pub os: Vec<Os>,
    pub libs: Vec<String>,
}

/// Declared sub-library
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentDecl {
    #[serde(default)]
    pub libs: Vec<String>,

    /// `dep::component`, `dep` or a sibling component name
    #[serde(default)]
    pub requires: Vec<String>,

    #[serde(default)]
    pub system_libs: Vec<SystemLibs>,

    #[serde(default)]
    pub defines: Vec<DefineDecl>,

    #[serde(default)]
    pub cmake_target_name: Option<String>,

    #[serde(default)]
    pub pkg_config_name: Option<String>,
}
