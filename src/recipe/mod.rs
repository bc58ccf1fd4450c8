// src/recipe/mod.rs

//! Recipe system for building C/C++ libraries from source
//!
//! A recipe declares one library: its options, dependencies, source archives,
//! patches, build system and what consumers need to link against it. Cooking
//! a recipe runs a fixed pipeline:
//!
//! 1. Option Model: merge defaults and overrides, prune inapplicable options
//! 2. Dependency Declarator: decide requirements for the resolved options
//! 3. Source Acquirer: fetch, verify, extract and patch sources
//! 4. Build Invoker: configure, compile, optionally test, install
//! 5. Packager: copy the install tree into the package layout
//! 6. Package-Info Emitter: describe libraries, defines and components
//!
//! # Culinary Terminology
//!
//! - **Recipe**: The build specification (like a recipe card)
//! - **Cook**: Build a package from a recipe
//! - **Kitchen**: The build environment
//! - **Prep**: Fetch and prepare sources
//! - **Simmer**: The actual build process
//! - **Plate**: Package the result
//!
//! # Example Recipe
//!
//! ```toml
//! [package]
//! name = "zeromq"
//! version = "4.3.5"
//! license = "MPL-2.0"
//!
//! [sources."4.3.5"]
//! url = "https://github.com/zeromq/libzmq/releases/download/v%(version)s/zeromq-%(version)s.tar.gz"
//! checksum = "sha256:6653ef5910f17954861fe72332e68b03ca6e4d9c7160eb3a8de5a5a913bfab43"
//!
//! [options]
//! shared = { values = [true, false], default = false }
//! fPIC = { values = [true, false], default = true }
//! encryption = { values = [false, "libsodium", "tweetnacl"], default = "libsodium" }
//!
//! [[requires]]
//! ref = "libsodium/1.0.19"
//! when = { option = "encryption", value = "libsodium" }
//!
//! [build]
//! system = "cmake"
//!
//! [info]
//! libs = ["zmq"]
//! ```

pub mod build_system;
pub mod condition;
mod format;
pub mod graph;
pub mod kitchen;
pub mod options;
pub mod package_info;
pub mod parser;
pub mod requires;

pub use build_system::{BuildConfiguration, BuildStep, BuildSystem, FlagStyle, Invocation};
pub use condition::Condition;
pub use format::{
    BuildFlag, BuildSection, ComponentDecl, CompilerMinimum, DefineDecl, InfoSection,
    InvalidRule, Language, OptionDecl, PackageFiles, PackageSection, PackageType, PatchInfo,
    Recipe, ReplaceSpec, RequirementDecl, SourceSection, SystemLibs,
};
pub use graph::RecipeGraph;
pub use kitchen::{
    Cook, CookRequest, CookResult, Kitchen, KitchenConfig, PackageLayout, Plan, SystemRunner,
    ToolOutput, ToolRunner,
};
pub use options::{OptionDomain, OptionModel, OptionValue, Overrides, ResolvedOptions};
pub use package_info::{ComponentInfo, PackageInfo};
pub use parser::{parse_recipe, parse_recipe_file, validate_recipe};
pub use requires::{DependencyContext, DependencyEdge};
