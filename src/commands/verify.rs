// src/commands/verify.rs
//! Verify command: compare a fresh resolution against a lockfile

use super::{Session, recipe_dir};
use crate::cli::ResolveArgs;
use anyhow::{Context, Result, bail};
use kiln::{LOCKFILE_NAME, Lockfile};
use std::path::Path;

pub async fn cmd_verify(manifest: &Path, args: &ResolveArgs, lockfile: Option<&Path>) -> Result<()> {
    let lock_path = lockfile
        .map(Path::to_path_buf)
        .unwrap_or_else(|| recipe_dir(manifest).join(LOCKFILE_NAME));
    let locked = Lockfile::from_file(&lock_path)
        .with_context(|| format!("Failed to load lockfile {}", lock_path.display()))?;

    let session = Session::open(manifest, args)?;
    let plan = session
        .resolver
        .resolve(session.root, &session.settings)
        .await?;

    match locked.validate_against(&plan) {
        Ok(()) => {
            println!(
                "{} is up to date ({} packages)",
                lock_path.display(),
                locked.len()
            );
            Ok(())
        }
        Err(errors) => {
            println!("{} is out of date:", lock_path.display());
            for error in &errors {
                println!("  {}", error);
            }
            bail!("{} lockfile mismatch(es)", errors.len())
        }
    }
}
