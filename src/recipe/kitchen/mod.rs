// src/recipe/kitchen/mod.rs

//! Kitchen: the build environment for cooking recipes
//!
//! The Kitchen drives one recipe from options to a finished package:
//! - Resolving options and declaring dependencies (no side effects)
//! - Fetching source archives and patches into a checksum-keyed cache
//! - Extracting and patching sources
//! - Running the configure/compile/test/install steps
//! - Packaging the result and writing its consumer metadata

pub mod archive;
mod config;
mod cook;
pub mod plate;
pub mod runner;

pub use config::{CookRequest, CookResult, KitchenConfig, Plan};
pub use cook::Cook;
pub use plate::{BuildArtifacts, PackageLayout};
pub use runner::{SystemRunner, ToolOutput, ToolRunner};

use crate::error::{Error, Result};
use crate::hash::Checksum;
use crate::recipe::format::Recipe;
use crate::recipe::options::OptionModel;
use crate::recipe::package_info::INFO_FILE;
use crate::recipe::requires;
use archive::{download_file, is_remote, local_source_path};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The Kitchen: where recipes are cooked
pub struct Kitchen {
    pub(crate) config: KitchenConfig,
    /// Executes patch and build tools
    runner: Arc<dyn ToolRunner>,
}

impl Kitchen {
    /// Create a new Kitchen that runs real processes
    pub fn new(config: KitchenConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner))
    }

    /// Create a new Kitchen with a custom tool runner
    pub fn with_runner(config: KitchenConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self { config, runner }
    }

    /// Create a Kitchen with default configuration
    pub fn with_defaults() -> Self {
        Self::new(KitchenConfig::default())
    }

    pub fn config(&self) -> &KitchenConfig {
        &self.config
    }

    /// Decide options and dependencies for a request
    ///
    /// Touches neither the network nor the filesystem. Every configuration
    /// error surfaces here, before any build work.
    pub fn prepare(&self, recipe: &Recipe, request: &CookRequest) -> Result<Plan> {
        let version = request
            .version
            .clone()
            .unwrap_or_else(|| recipe.package.version.clone());
        let settings = recipe.effective_settings(&request.settings);

        let mut model = OptionModel::from_recipe(recipe);
        model.apply_overrides(&request.overrides)?;
        let options = model.resolve(&settings);
        let edges = requires::declare(recipe, &options, &settings)?;

        debug!(
            "Plan for {}/{}: options [{}], {} dependencies",
            recipe.package.name,
            version,
            options,
            edges.len()
        );

        Ok(Plan {
            version,
            settings,
            options,
            edges,
        })
    }

    /// Cook a recipe into `output_dir`
    ///
    /// `output_dir` becomes the package root: `include/ lib/ bin/ res/
    /// licenses/` plus `pantry-info.json`. An existing non-empty directory
    /// is only replaced when it holds a previous package.
    ///
    /// ## Cooking Process
    /// 1. **Prepare**: Resolve options, validate, declare dependencies
    /// 2. **Prep**: Fetch source archive and patches
    /// 3. **Unpack**: Extract sources and apply patches
    /// 4. **Simmer**: Run configure/compile/test/install
    /// 5. **Plate**: Package the install tree and write metadata
    pub fn cook(&self, recipe: &Recipe, request: &CookRequest, output_dir: &Path) -> Result<CookResult> {
        let plan = self.prepare(recipe, request)?;
        info!("Cooking {} version {}", recipe.package.name, plan.version);

        check_output_dir(output_dir)?;

        let mut cook = Cook::new(self, recipe, &plan)?;
        cook.warnings.extend(plan.options.notes().iter().cloned());
        cook.log_options();

        info!("Prep: fetching ingredients...");
        cook.prep()?;

        info!("Unpacking and patching sources...");
        cook.unpack()?;
        cook.patch()?;

        info!("Simmering: running build...");
        cook.simmer()?;

        info!("Plating: packaging...");
        let (layout, info) = cook.plate(output_dir)?;

        let build_dir = if self.config.keep_builddir {
            let path = cook.build_dir.keep();
            info!("Keeping build directory: {}", path.display());
            Some(path)
        } else {
            None
        };

        Ok(CookResult {
            layout,
            info,
            edges: plan.edges.clone(),
            options: plan.options.clone(),
            log: cook.log,
            warnings: cook.warnings,
            build_dir,
        })
    }

    /// Fetch sources for a recipe without building
    ///
    /// Downloads and verifies the source archive and remote patches for
    /// `version` (the recipe default when `None`), caching them locally.
    /// Useful for pre-fetching before an offline build.
    ///
    /// # Returns
    /// A list of paths to the fetched and cached source files.
    pub fn fetch(&self, recipe: &Recipe, version: Option<&str>) -> Result<Vec<PathBuf>> {
        let version = version.unwrap_or(recipe.package.version.as_str());
        info!("Fetching sources for {} version {}", recipe.package.name, version);

        let mut fetched = Vec::new();
        let base = recipe.recipe_dir.as_deref();

        if !(recipe.is_header_only() && !recipe.sources.contains_key(version)) {
            let source = recipe.source_for(version)?;
            let url = recipe.archive_url(version)?;
            let checksum = Checksum::parse(&source.checksum)?;
            info!("Fetching: {}", url);
            fetched.push(self.fetch_source(&url, &checksum, base)?);
        }

        for patch in recipe.patches_for(version) {
            let (Some(file), Some(checksum)) = (&patch.file, &patch.checksum) else {
                continue;
            };
            if is_remote(file) {
                info!("Fetching patch: {}", file);
                let checksum = Checksum::parse(checksum)?;
                fetched.push(self.fetch_source(file, &checksum, None)?);
            }
        }

        info!(
            "Fetched {} source file(s) for {}",
            fetched.len(),
            recipe.package.name
        );

        Ok(fetched)
    }

    /// Check if all sources for a recipe version are already cached
    ///
    /// Returns `true` if the build can proceed without network access.
    pub fn sources_cached(&self, recipe: &Recipe, version: Option<&str>) -> bool {
        let version = version.unwrap_or(recipe.package.version.as_str());
        let cached = |location: &str, checksum: &str| {
            if !is_remote(location) {
                return true;
            }
            match Checksum::parse(checksum) {
                Ok(sum) => self.config.source_cache.join(sum.cache_key()).exists(),
                Err(_) => false,
            }
        };

        if let Some(source) = recipe.sources.get(version) {
            let url = recipe.substitute(&source.url, version);
            if !cached(&url, &source.checksum) {
                return false;
            }
        } else if !recipe.is_header_only() {
            return false;
        }

        recipe.patches_for(version).iter().all(|patch| match &patch.file {
            Some(file) if is_remote(file) => patch
                .checksum
                .as_deref()
                .is_some_and(|sum| cached(file, sum)),
            _ => true,
        })
    }

    /// Fetch a source file (with caching)
    ///
    /// Remote files are cached under their checksum and re-verified on every
    /// use; a corrupt cache entry is downloaded again. Local files are
    /// verified in place.
    pub(crate) fn fetch_source(
        &self,
        location: &str,
        checksum: &Checksum,
        base: Option<&Path>,
    ) -> Result<PathBuf> {
        if !is_remote(location) {
            let path = local_source_path(location, base);
            if !path.is_file() {
                return Err(Error::NotFound(format!(
                    "Source file not found: {}",
                    path.display()
                )));
            }
            checksum.verify_file(&path)?;
            return Ok(path);
        }

        // Create cache directory if needed
        fs::create_dir_all(&self.config.source_cache)?;

        // Use checksum as cache key
        let cache_key = checksum.cache_key();
        let cached_path = self.config.source_cache.join(&cache_key);

        // Check if already cached
        if cached_path.exists() {
            debug!("Using cached source: {}", cached_path.display());
            match checksum.verify_file(&cached_path) {
                Ok(()) => return Ok(cached_path),
                Err(Error::ChecksumMismatch { .. }) => {
                    warn!("Cached file checksum mismatch, re-downloading");
                    fs::remove_file(&cached_path)?;
                }
                Err(e) => return Err(e),
            }
        }

        if self.config.offline {
            return Err(Error::DownloadError(format!(
                "{} is not cached and offline mode is enabled",
                location
            )));
        }

        // Download the source
        info!("Downloading: {}", location);
        let temp_path = self.config.source_cache.join(format!("{}.tmp", cache_key));

        download_file(location, &temp_path, self.config.progress)?;

        // Verify checksum
        if let Err(e) = checksum.verify_file(&temp_path) {
            fs::remove_file(&temp_path)?;
            return Err(e);
        }

        // Move to final location
        fs::rename(&temp_path, &cached_path)?;
        Ok(cached_path)
    }
}

/// Refuse to replace a directory that does not hold a previous package
fn check_output_dir(output_dir: &Path) -> Result<()> {
    if !output_dir.is_dir() {
        return Ok(());
    }
    let empty = fs::read_dir(output_dir)?.next().is_none();
    if empty || output_dir.join(INFO_FILE).is_file() {
        return Ok(());
    }
    Err(Error::PackagingError(format!(
        "{} is not empty and does not contain a previous package",
        output_dir.display()
    )))
}
