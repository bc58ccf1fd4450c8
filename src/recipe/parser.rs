// src/recipe/parser.rs

//! Recipe file parsing

use crate::error::{Error, Result};
use crate::hash::Checksum;
use crate::recipe::condition::Condition;
use crate::recipe::format::Recipe;
use crate::recipe::package_info;
use crate::version::PackageRef;
use std::path::Path;

/// Parse a recipe from a TOML string
pub fn parse_recipe(content: &str) -> Result<Recipe> {
    toml::from_str(content).map_err(|e| Error::ParseError(format!("Invalid recipe: {}", e)))
}

/// Parse a recipe from a file
///
/// Relative patch files and local sources resolve against the recipe's
/// directory.
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::IoError(format!("Failed to read recipe file: {}", e)))?;

    let mut recipe = parse_recipe(&content)?;
    recipe.recipe_dir = path.parent().map(Path::to_path_buf);
    Ok(recipe)
}

/// Validate a recipe for completeness and correctness
///
/// Hard problems are errors; soft ones come back as warnings.
pub fn validate_recipe(recipe: &Recipe) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    // Check for empty name/version
    if recipe.package.name.is_empty() {
        return Err(Error::ParseError("Recipe package name cannot be empty".to_string()));
    }
    if recipe.package.version.is_empty() {
        return Err(Error::ParseError("Recipe package version cannot be empty".to_string()));
    }

    if !recipe.sources.contains_key(&recipe.package.version) && !recipe.is_header_only() {
        return Err(Error::ParseError(format!(
            "No source declared for default version {}",
            recipe.package.version
        )));
    }

    // Validate checksum format
    for (version, source) in &recipe.sources {
        Checksum::parse(&source.checksum).map_err(|e| {
            Error::ParseError(format!("Source for version {}: {}", version, e))
        })?;
    }

    for decl in recipe.requires.iter().chain(&recipe.tool_requires) {
        PackageRef::parse(&decl.reference)?;
    }

    for (name, decl) in &recipe.options {
        if !decl.values.contains(&decl.default) {
            return Err(Error::ParseError(format!(
                "Default '{}' of option '{}' is not one of {}",
                decl.default,
                name,
                decl.values.describe()
            )));
        }
        for cond in &decl.remove_when {
            check_condition(recipe, cond, &format!("remove_when of option '{}'", name))?;
        }
    }

    for decl in recipe.requires.iter().chain(&recipe.tool_requires) {
        if let Some(cond) = &decl.when {
            check_condition(recipe, cond, &format!("requirement {}", decl.reference))?;
        }
    }
    for rule in &recipe.invalid {
        check_condition(recipe, &rule.when, "invalid rule")?;
    }
    for flag in &recipe.build.flags {
        if !recipe.options.contains_key(&flag.option) {
            return Err(Error::ParseError(format!(
                "Build flag refers to undeclared option '{}'",
                flag.option
            )));
        }
        if let Some(cond) = &flag.when {
            check_condition(recipe, cond, &format!("build flag {}", flag.option))?;
        }
    }
    for define in &recipe.info.defines {
        if let Some(cond) = &define.when {
            check_condition(recipe, cond, &format!("define {}", define.define))?;
        }
    }
    package_info::check_component_requires(recipe)?;
    if let Some(test_option) = &recipe.build.test_option {
        if !recipe.options.contains_key(test_option) {
            return Err(Error::ParseError(format!(
                "test_option refers to undeclared option '{}'",
                test_option
            )));
        }
    }

    for (version, patches) in &recipe.patches {
        if !recipe.sources.contains_key(version) {
            warnings.push(format!("Patches declared for unknown version {}", version));
        }
        for patch in patches {
            match (&patch.file, &patch.replace) {
                (Some(_), None) | (None, Some(_)) => {}
                _ => {
                    return Err(Error::ParseError(format!(
                        "Patch '{}' for version {} must set exactly one of file or replace",
                        patch.label(),
                        version
                    )));
                }
            }
            if let Some(replace) = &patch.replace {
                if replace.regex {
                    regex::Regex::new(&replace.search).map_err(|e| {
                        Error::ParseError(format!("Patch '{}': bad regex: {}", patch.label(), e))
                    })?;
                }
            }
            // Validate patch checksums for remote patches
            if patch.is_remote() && patch.checksum.is_none() {
                warnings.push(format!("Remote patch {} has no checksum", patch.label()));
            }
        }
    }

    // Warn about missing fields
    if recipe.package.description.is_none() {
        warnings.push("Missing package description".to_string());
    }
    if recipe.package.license.is_none() {
        warnings.push("Missing package license".to_string());
    }
    if recipe.info.libs.is_empty()
        && recipe.info.components.is_empty()
        && recipe.package.package_type == crate::recipe::format::PackageType::Library
    {
        warnings.push("Library declares no libs in [info]".to_string());
    }

    Ok(warnings)
}

fn check_condition(recipe: &Recipe, cond: &Condition, context: &str) -> Result<()> {
    match cond.referenced_option() {
        Some(name) if !recipe.options.contains_key(name) => Err(Error::ParseError(format!(
            "Condition in {} refers to undeclared option '{}'",
            context, name
        ))),
        _ => Ok(()),
    }
}
