// src/recipe/kitchen/config.rs

//! Configuration types for the Kitchen

use crate::error::{Error, Result};
use crate::recipe::kitchen::plate::PackageLayout;
use crate::recipe::options::{Overrides, ResolvedOptions};
use crate::recipe::package_info::PackageInfo;
use crate::recipe::requires::DependencyEdge;
use crate::settings::Settings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Configuration for the Kitchen
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Directory for downloaded sources
    pub source_cache: PathBuf,
    /// Parent directory for temporary build trees (system temp when unset)
    pub build_root: Option<PathBuf>,
    /// Timeout for each external tool invocation
    pub timeout: Duration,
    /// Number of parallel jobs handed to the build tool
    pub jobs: u32,
    /// Keep build directory after completion (for debugging)
    pub keep_builddir: bool,
    /// Never touch the network; sources must already be cached or local
    pub offline: bool,
    /// Show download progress bars
    pub progress: bool,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        let source_cache = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("pantry")
            .join("sources");

        Self {
            source_cache,
            build_root: None,
            timeout: Duration::from_secs(3600), // 1 hour
            jobs,
            keep_builddir: false,
            offline: false,
            progress: false,
        }
    }
}

/// On-disk form of [`KitchenConfig`]; every field is optional
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    source_cache: Option<PathBuf>,
    build_root: Option<PathBuf>,
    timeout_secs: Option<u64>,
    jobs: Option<u32>,
    keep_builddir: Option<bool>,
    offline: Option<bool>,
    progress: Option<bool>,
}

impl KitchenConfig {
    /// Default location of the user config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("pantry").join("config.toml"))
    }

    /// Load configuration from a TOML file, falling back to defaults per field
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::IoError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::ParseError(format!("{}: {}", path.display(), e)))
    }

    /// Load the user config file if it exists
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                debug!("Loading kitchen config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Parse configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| Error::ParseError(format!("Invalid kitchen config: {}", e)))?;

        let mut config = Self::default();
        if let Some(dir) = file.source_cache {
            config.source_cache = dir;
        }
        if file.build_root.is_some() {
            config.build_root = file.build_root;
        }
        if let Some(secs) = file.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(jobs) = file.jobs {
            config.jobs = jobs.max(1);
        }
        if let Some(keep) = file.keep_builddir {
            config.keep_builddir = keep;
        }
        if let Some(offline) = file.offline {
            config.offline = offline;
        }
        if let Some(progress) = file.progress {
            config.progress = progress;
        }
        Ok(config)
    }
}

/// What to cook: target settings, option overrides and version
#[derive(Debug, Clone)]
pub struct CookRequest {
    pub settings: Settings,
    pub overrides: Overrides,
    /// Upstream version (the recipe's default when unset)
    pub version: Option<String>,
}

impl CookRequest {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            overrides: Overrides::new(),
            version: None,
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Options and dependencies decided for one cook, before any side effects
#[derive(Debug, Clone)]
pub struct Plan {
    pub version: String,
    /// Settings as seen by the recipe
    pub settings: Settings,
    pub options: ResolvedOptions,
    pub edges: Vec<DependencyEdge>,
}

/// Result of cooking a recipe
#[derive(Debug)]
pub struct CookResult {
    /// Packaged tree
    pub layout: PackageLayout,
    /// Consumer metadata (also written to `pantry-info.json`)
    pub info: PackageInfo,
    /// Declared dependencies
    pub edges: Vec<DependencyEdge>,
    /// Final option values
    pub options: ResolvedOptions,
    /// Build log
    pub log: String,
    /// Warnings generated during the cook
    pub warnings: Vec<String>,
    /// Build directory, when kept
    pub build_dir: Option<PathBuf>,
}
