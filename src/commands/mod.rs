// src/commands/mod.rs
//! Command handlers for the kiln CLI

mod check;
mod lock;
mod plan;
mod verify;

pub use check::cmd_check;
pub use lock::cmd_lock;
pub use plan::cmd_plan;
pub use verify::cmd_verify;

use crate::cli::ResolveArgs;
use anyhow::{Context, Result};
use kiln::{ChainSource, Config, Manifest, Resolver, Settings};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Everything a resolving command needs, with CLI flags layered over the config
pub(crate) struct Session {
    pub root: Manifest,
    pub resolver: Resolver<ChainSource>,
    pub settings: Settings,
}

impl Session {
    pub fn open(manifest: &Path, args: &ResolveArgs) -> Result<Self> {
        let root = kiln::recipe::parse_file(manifest)
            .with_context(|| format!("Failed to load recipe {}", manifest.display()))?;

        let mut config = Config::load(args.config.as_deref())?;
        let cli_settings = Settings::from_pairs(&args.settings)?;
        config.settings.merge(&cli_settings);
        // Sources named on the command line take priority
        let mut recipe_dirs = args.recipe_dirs.clone();
        recipe_dirs.append(&mut config.sources.recipe_dirs);
        config.sources.recipe_dirs = recipe_dirs;
        let mut remotes = args.remotes.clone();
        remotes.append(&mut config.sources.remotes);
        config.sources.remotes = remotes;
        if let Some(jobs) = args.jobs {
            config.resolver.max_concurrent_fetches = jobs;
        }
        config.validate()?;

        let source = config.source_chain()?;
        if source.is_empty() && !root.requires.is_empty() {
            warn!("No recipe sources configured; pass -r DIR or add [sources] to kiln.toml");
        }
        debug!(
            "{} recipe source(s), settings [{}]",
            source.len(),
            config.settings
        );

        Ok(Self {
            root,
            resolver: Resolver::new(source, config.resolver),
            settings: config.settings,
        })
    }
}

/// Directory holding a recipe file
pub(crate) fn recipe_dir(manifest: &Path) -> PathBuf {
    match manifest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Shorten a package id for display
pub(crate) fn short_id(package_id: &str) -> &str {
    package_id.get(..12).unwrap_or(package_id)
}
