// src/commands/plan.rs
//! Plan command: resolve and print without writing

use super::{Session, short_id};
use crate::cli::ResolveArgs;
use anyhow::{Result, anyhow};
use std::path::Path;

pub async fn cmd_plan(
    manifest: &Path,
    args: &ResolveArgs,
    json: bool,
    link_order: Option<&str>,
) -> Result<()> {
    let session = Session::open(manifest, args)?;
    let plan = session
        .resolver
        .resolve(session.root, &session.settings)
        .await?;

    if let Some(name) = link_order {
        let order = plan
            .link_order(name)
            .ok_or_else(|| anyhow!("{} is not part of the plan for {}", name, plan.root))?;
        if order.is_empty() {
            println!("{} has no dependencies", name);
        } else {
            println!("Link order for {}:", name);
            for dependency in order {
                println!("  {}", dependency);
            }
        }
        return Ok(());
    }

    if json {
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    println!("Build plan for {} ({} packages):", plan.root, plan.packages.len());
    for (i, package) in plan.packages.iter().enumerate() {
        println!(
            "  {:>3}. {}/{} [{}]",
            i + 1,
            package.name,
            package.version,
            short_id(&package.package_id)
        );
        if !package.options.is_empty() {
            let options: Vec<String> = package
                .options
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!("       options: {}", options.join(", "));
        }
        if !package.requires.is_empty() {
            println!("       requires: {}", package.requires.join(", "));
        }
    }

    let cache = session.resolver.cache_stats();
    println!(
        "\nFetched {} recipe(s), {} request(s) served from cache",
        cache.upstream_fetches, cache.coalesced
    );
    Ok(())
}
