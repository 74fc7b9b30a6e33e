// src/commands/lock.rs
//! Lock command: resolve and write outputs

use super::{Session, recipe_dir, short_id};
use crate::cli::ResolveArgs;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Resolve a recipe, write the lockfile and generator outputs, and report
/// which packages have prebuilt binaries
pub async fn cmd_lock(manifest: &Path, args: &ResolveArgs, output: Option<&Path>) -> Result<()> {
    let session = Session::open(manifest, args)?;
    let plan = session
        .resolver
        .resolve(session.root, &session.settings)
        .await?;

    let out_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| recipe_dir(manifest));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    for generator in plan.output_generators() {
        match plan.render(&generator)? {
            Some((file_name, content)) => {
                let path = out_dir.join(file_name);
                std::fs::write(&path, content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
            None => info!("Generator {} is left to downstream tooling", generator),
        }
    }

    let located = session.resolver.locate_artifacts(&plan).await?;
    let prebuilt = located.iter().filter(|(_, handle)| handle.is_some()).count();

    println!("\nLocked {} package(s) for {}:", plan.packages.len(), plan.root);
    for (package, handle) in &located {
        let status = match handle {
            Some(handle) => format!("prebuilt at {}", handle.location),
            None => "build from source".to_string(),
        };
        println!(
            "  {}/{} [{}] {}",
            package.name,
            package.version,
            short_id(&package.package_id),
            status
        );
    }
    println!(
        "\n{} prebuilt, {} to build",
        prebuilt,
        located.len() - prebuilt
    );

    Ok(())
}
