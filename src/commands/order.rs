// src/commands/order.rs

//! Order command - build order across a directory of recipes

use anyhow::{Context, Result};
use pantry::recipe::{parse_recipe_file, RecipeGraph};
use std::path::Path;
use tracing::debug;

pub fn cmd_order(dir: &Path) -> Result<()> {
    let pattern = format!("{}/*.toml", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut paths: Vec<_> = glob::glob(&pattern)
        .context("Invalid recipe directory")?
        .flatten()
        .collect();
    paths.sort();

    let mut recipes = Vec::with_capacity(paths.len());
    for path in &paths {
        debug!("Loading {}", path.display());
        let recipe = parse_recipe_file(path)
            .with_context(|| format!("Failed to parse recipe: {}", path.display()))?;
        recipes.push(recipe);
    }

    let graph = RecipeGraph::from_recipes(&recipes);
    let order = graph
        .topological_sort()
        .context("Cannot order recipes")?;

    let known: Vec<&str> = recipes.iter().map(|r| r.package.name.as_str()).collect();
    for (index, name) in order.iter().enumerate() {
        if known.contains(&name.as_str()) {
            println!("{:3}. {}", index + 1, name);
        } else {
            println!("{:3}. {} (no recipe)", index + 1, name);
        }
    }

    Ok(())
}
