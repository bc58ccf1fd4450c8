// src/commands/fetch.rs

//! Fetch command - download and verify sources without building

use super::{load_config, load_recipe};
use anyhow::{Context, Result};
use pantry::recipe::Kitchen;
use std::path::Path;

pub fn cmd_fetch(
    recipe_path: &Path,
    version: Option<&str>,
    source_cache: Option<&Path>,
    config_path: Option<&Path>,
) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;

    let mut config = load_config(config_path)?;
    if let Some(cache) = source_cache {
        config.source_cache = cache.to_path_buf();
    }
    config.progress = true;
    let kitchen = Kitchen::new(config);

    println!("Fetching sources...");
    let sources = kitchen
        .fetch(&recipe, version)
        .with_context(|| format!("Failed to fetch sources for {}", recipe.package.name))?;

    println!("\n[COMPLETE] Fetched {} source file(s):", sources.len());
    for source in &sources {
        println!("  - {}", source.display());
    }

    if kitchen.sources_cached(&recipe, version) {
        println!("\n[OK] All sources are cached. Ready for offline build.");
    }

    Ok(())
}
