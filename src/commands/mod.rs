// src/commands/mod.rs
//! Command handlers for the pantry CLI

mod cook;
mod fetch;
mod order;
mod resolve;
mod validate;

// Re-export all command handlers
pub use cook::{cmd_cook, CookArgs};
pub use fetch::cmd_fetch;
pub use order::cmd_order;
pub use resolve::cmd_resolve;
pub use validate::cmd_validate;

use crate::cli::TargetArgs;
use anyhow::{Context, Result};
use pantry::recipe::{parse_recipe_file, validate_recipe, CookRequest, Overrides, Recipe};
use pantry::{KitchenConfig, Settings};
use std::path::Path;

/// Load the kitchen configuration from `path`, or the user default
fn load_config(path: Option<&Path>) -> Result<KitchenConfig> {
    match path {
        Some(path) => KitchenConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display())),
        None => KitchenConfig::load_default().context("Failed to load default config"),
    }
}

/// Parse and validate a recipe, printing validation warnings
fn load_recipe(path: &Path) -> Result<Recipe> {
    let recipe = parse_recipe_file(path)
        .with_context(|| format!("Failed to parse recipe: {}", path.display()))?;

    let warnings = validate_recipe(&recipe)
        .with_context(|| format!("Recipe validation failed: {}", path.display()))?;
    for warning in &warnings {
        eprintln!("Warning: {}", warning);
    }

    Ok(recipe)
}

/// Build a cook request from command-line settings and options
fn build_request(target: &TargetArgs) -> Result<CookRequest> {
    let settings = Settings::from_pairs(&target.settings).context("Invalid settings")?;
    let overrides = Overrides::parse(&target.options).context("Invalid option overrides")?;

    let mut request = CookRequest::new(settings).with_overrides(overrides);
    if let Some(version) = &target.version {
        request = request.with_version(version.clone());
    }
    Ok(request)
}
