// src/commands/check.rs
//! Recipe validation command

use anyhow::{Context, Result};
use std::path::Path;

/// Parse a recipe and print what it declares
pub fn cmd_check(manifest: &Path) -> Result<()> {
    let recipe = kiln::recipe::parse_file(manifest)
        .with_context(|| format!("Failed to load recipe {}", manifest.display()))?;

    println!("Recipe: {}", recipe.id);
    if let Some(description) = &recipe.description {
        println!("  Description: {}", description);
    }
    if let Some(license) = &recipe.license {
        println!("  License: {}", license);
    }
    if let Some(author) = &recipe.author {
        println!("  Author: {}", author);
    }
    if let Some(url) = &recipe.url {
        println!("  URL: {}", url);
    }

    if !recipe.settings.is_empty() {
        println!("  Settings: {}", recipe.settings.join(", "));
    }
    for (key, value) in &recipe.setting_overrides {
        println!("  Setting override: {}={}", key, value);
    }

    if !recipe.options.is_empty() {
        println!("  Options:");
        for (name, domain) in &recipe.options {
            match recipe.defaults.get(name) {
                Some(default) => println!("    {} {} (default {})", name, domain, default),
                None => println!("    {} {}", name, domain),
            }
        }
    }

    if !recipe.requires.is_empty() {
        println!("  Requires:");
        for requirement in &recipe.requires {
            println!("    {}", requirement);
        }
    }
    if !recipe.pins.is_empty() {
        println!("  Pins:");
        for pin in &recipe.pins {
            println!("    {}", pin);
        }
    }

    let overrides: Vec<_> = recipe.dependency_overrides().collect();
    if !overrides.is_empty() {
        println!("  Dependency options:");
        for (_, assignment) in overrides {
            println!("    {}", assignment);
        }
    }

    if !recipe.generators.is_empty() {
        println!("  Generators: {}", recipe.generators.join(", "));
    }

    println!("\n{} is valid", manifest.display());
    Ok(())
}
