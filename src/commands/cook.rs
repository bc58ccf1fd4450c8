// src/commands/cook.rs

//! Cook command - build packages from recipes

use super::{build_request, load_config, load_recipe};
use crate::cli::TargetArgs;
use anyhow::{Context, Result};
use pantry::recipe::Kitchen;
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for `pantry cook` beyond the target selection
pub struct CookArgs<'a> {
    pub recipe_path: &'a Path,
    pub target: &'a TargetArgs,
    pub output: Option<&'a Path>,
    pub source_cache: Option<&'a Path>,
    pub jobs: Option<u32>,
    pub keep_builddir: bool,
    pub offline: bool,
    pub config_path: Option<&'a Path>,
}

/// Cook a package from a recipe
pub fn cmd_cook(args: CookArgs<'_>) -> Result<()> {
    println!("Reading recipe: {}", args.recipe_path.display());
    let recipe = load_recipe(args.recipe_path)?;
    let request = build_request(args.target)?;

    let version = request
        .version
        .clone()
        .unwrap_or_else(|| recipe.package.version.clone());
    println!("Recipe: {} version {}", recipe.package.name, version);

    // Command-line flags override the config file
    let mut config = load_config(args.config_path)?;
    if let Some(cache) = args.source_cache {
        config.source_cache = cache.to_path_buf();
    }
    if let Some(j) = args.jobs {
        config.jobs = j.max(1);
    }
    config.keep_builddir |= args.keep_builddir;
    config.offline |= args.offline;
    config.progress = true;

    let output_dir = args
        .output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("{}-{}", recipe.package.name, version)));

    let kitchen = Kitchen::new(config);

    if kitchen.sources_cached(&recipe, Some(&version)) {
        println!("  - Sources already cached (offline build possible)");
    }
    println!("Cooking with {} parallel jobs...", kitchen.config().jobs);

    let result = kitchen
        .cook(&recipe, &request, &output_dir)
        .with_context(|| format!("Failed to cook {}", recipe.package.name))?;

    println!("\n[COMPLETE] Cooked: {}", result.layout.root.display());
    println!("  Options: {}", result.options);
    for edge in &result.edges {
        println!("  Requires: {}", edge);
    }
    println!("  Libraries: {}", result.info.libs.join(" "));
    if !result.info.system_libs.is_empty() {
        println!("  System libraries: {}", result.info.system_libs.join(" "));
    }

    if !result.warnings.is_empty() {
        println!("\nBuild warnings:");
        for warning in &result.warnings {
            println!("  - {}", warning);
        }
    }

    if let Some(dir) = &result.build_dir {
        println!("\nBuild directory kept at {}", dir.display());
    }

    info!(
        "Successfully cooked {} to {}",
        recipe.package.name,
        result.layout.root.display()
    );

    Ok(())
}
