// src/lib.rs

//! Pantry: declarative build recipes for C/C++ libraries
//!
//! Turns a TOML recipe plus target settings into an installed, packaged
//! library and the metadata consumers need to link against it.
//!
//! # Architecture
//!
//! - Recipes: declarative option, dependency, source and build descriptions
//! - Settings: target OS, architecture, compiler and build type
//! - Kitchen: drives fetch, patch, build and packaging for one recipe
//! - Tool runner: the single seam through which external tools execute

mod error;
pub mod hash;
pub mod recipe;
pub mod settings;
pub mod version;

pub use error::{Error, ErrorKind, Result};
pub use hash::{Checksum, HashAlgorithm};
pub use recipe::{
    Cook, CookRequest, CookResult, Kitchen, KitchenConfig, PackageInfo, Recipe, ResolvedOptions,
};
pub use settings::Settings;
pub use version::{PackageRef, Version, VersionReq};
