// src/commands/resolve.rs

//! Resolve command - show options and dependencies without building

use super::{build_request, load_recipe};
use crate::cli::TargetArgs;
use anyhow::{Context, Result};
use pantry::recipe::{DependencyEdge, Kitchen, KitchenConfig, ResolvedOptions};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct Resolution<'a> {
    name: &'a str,
    version: &'a str,
    settings: String,
    options: &'a ResolvedOptions,
    removed_options: Vec<&'a str>,
    requires: &'a [DependencyEdge],
    notes: &'a [String],
}

/// Print resolved options and dependency edges as JSON
pub fn cmd_resolve(recipe_path: &Path, target: &TargetArgs) -> Result<()> {
    let recipe = load_recipe(recipe_path)?;
    let request = build_request(target)?;

    // Planning has no side effects, so no configuration is needed
    let kitchen = Kitchen::new(KitchenConfig::default());
    let plan = kitchen
        .prepare(&recipe, &request)
        .with_context(|| format!("Cannot resolve {}", recipe.package.name))?;

    let resolution = Resolution {
        name: &recipe.package.name,
        version: &plan.version,
        settings: plan.settings.to_string(),
        options: &plan.options,
        removed_options: plan.options.removed().collect(),
        requires: &plan.edges,
        notes: plan.options.notes(),
    };

    println!("{}", serde_json::to_string_pretty(&resolution)?);
    Ok(())
}
