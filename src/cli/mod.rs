// src/cli/mod.rs
//! CLI definitions for pantry
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(author = "Pantry Contributors")]
#[command(version)]
#[command(about = "Build C/C++ libraries from declarative recipes", long_about = None)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Kitchen configuration file (default: ~/.config/pantry/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Target settings and option overrides shared by cook and resolve
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Target setting (os, arch, compiler, compiler.version, compiler.cppstd, build_type)
    #[arg(short = 's', long = "setting", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,

    /// Option override
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    /// Upstream version to build (default: the recipe's version)
    #[arg(long = "pkg-version", value_name = "VERSION")]
    pub version: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and package a library from a recipe
    Cook {
        /// Path to the recipe file
        recipe: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Package output directory (default: ./<name>-<version>)
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Directory for caching downloaded sources
        #[arg(long, value_name = "DIR")]
        source_cache: Option<PathBuf>,

        /// Number of parallel build jobs
        #[arg(short, long)]
        jobs: Option<u32>,

        /// Keep build directory after completion (for debugging)
        #[arg(long)]
        keep_builddir: bool,

        /// Fail instead of downloading sources that are not cached
        #[arg(long)]
        offline: bool,
    },

    /// Print resolved options and dependencies as JSON
    Resolve {
        /// Path to the recipe file
        recipe: PathBuf,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Check a recipe for errors and warnings
    Validate {
        /// Path to the recipe file
        recipe: PathBuf,
    },

    /// Download and verify sources without building
    Fetch {
        /// Path to the recipe file
        recipe: PathBuf,

        /// Upstream version (default: the recipe's version)
        #[arg(long = "pkg-version", value_name = "VERSION")]
        version: Option<String>,

        /// Directory for caching downloaded sources
        #[arg(long, value_name = "DIR")]
        source_cache: Option<PathBuf>,
    },

    /// Print the build order of all recipes in a directory
    Order {
        /// Directory containing *.toml recipes
        dir: PathBuf,
    },
}
