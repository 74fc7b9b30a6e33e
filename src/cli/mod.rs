// src/cli/mod.rs
//! CLI definitions for kiln
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations live in the `commands` module.
//!
//! - `lock` - Resolve a recipe and write the lockfile plus generator outputs
//! - `plan` - Resolve a recipe and print the build order
//! - `check` - Parse a recipe and report what it declares
//! - `verify` - Resolve again and compare against an existing lockfile

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(author = "Kiln Contributors")]
#[command(version)]
#[command(about = "Dependency resolution and build configuration for native recipes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command that runs a resolution
#[derive(Args, Debug, Clone, Default)]
pub struct ResolveArgs {
    /// Configuration file (default: ./kiln.toml if present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Global setting, may be repeated (e.g. -s os=Linux -s build_type=Release)
    #[arg(short = 's', long = "setting", value_name = "KEY=VALUE")]
    pub settings: Vec<String>,

    /// Recipe directory, searched before configured sources; may be repeated
    #[arg(short = 'r', long = "recipes", value_name = "DIR")]
    pub recipe_dirs: Vec<PathBuf>,

    /// Remote recipe index, searched before configured remotes; may be repeated
    #[arg(long = "remote", value_name = "URL")]
    pub remotes: Vec<String>,

    /// Maximum recipe fetches in flight
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a recipe and write the lockfile and generator outputs
    Lock {
        /// Path to the root recipe
        manifest: PathBuf,

        #[command(flatten)]
        resolve: ResolveArgs,

        /// Output directory (default: the recipe's directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Resolve a recipe and print the build order without writing anything
    Plan {
        /// Path to the root recipe
        manifest: PathBuf,

        #[command(flatten)]
        resolve: ResolveArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Print the link order for one package instead
        #[arg(long, value_name = "PACKAGE")]
        link_order: Option<String>,
    },

    /// Parse a recipe and report what it declares
    Check {
        /// Path to the recipe
        manifest: PathBuf,
    },

    /// Resolve again and compare the result against a lockfile
    Verify {
        /// Path to the root recipe
        manifest: PathBuf,

        #[command(flatten)]
        resolve: ResolveArgs,

        /// Lockfile to verify (default: kiln.lock next to the recipe)
        #[arg(short, long)]
        lockfile: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lock_flags() {
        let cli = Cli::try_parse_from([
            "kiln", "lock", "app/recipe.toml", "-s", "os=Linux", "-s", "arch=x86_64", "-r",
            "recipes", "-o", "out", "-j", "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Lock {
                manifest,
                resolve,
                output,
            } => {
                assert_eq!(manifest, PathBuf::from("app/recipe.toml"));
                assert_eq!(resolve.settings, vec!["os=Linux", "arch=x86_64"]);
                assert_eq!(resolve.recipe_dirs, vec![PathBuf::from("recipes")]);
                assert_eq!(resolve.jobs, Some(4));
                assert_eq!(output, Some(PathBuf::from("out")));
            }
            _ => panic!("expected lock"),
        }
    }

    #[test]
    fn test_verify_takes_lockfile() {
        let cli =
            Cli::try_parse_from(["kiln", "verify", "recipe.toml", "-l", "old.lock"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Verify { lockfile: Some(ref path), .. } if path == &PathBuf::from("old.lock")
        ));
    }
}
