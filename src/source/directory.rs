// src/source/directory.rs

//! Recipe source backed by a local directory tree
//!
//! Layout:
//!
//! ```text
//! <root>/<name>/<version>/recipe.toml
//! <root>/<name>/<version>/packages/<package_id>   (optional prebuilt binaries)
//! ```

use super::{ArtifactHandle, ArtifactRequest, RecipeSource};
use crate::error::{Error, Result};
use crate::recipe::{Manifest, parse_from};
use crate::version::{Version, VersionConstraint};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File name of a recipe inside its version directory
pub const RECIPE_FILE: &str = "recipe.toml";

/// Directory holding prebuilt binaries for one recipe version
pub const PACKAGES_DIR: &str = "packages";

#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the recipe for one identity
    pub fn recipe_path(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version).join(RECIPE_FILE)
    }

    /// Versions of `name` that have a recipe file, unordered
    async fn versions(&self, name: &str) -> Result<Vec<Version>> {
        let mut entries = match tokio::fs::read_dir(self.root.join(name)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Some(version) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if tokio::fs::try_exists(entry.path().join(RECIPE_FILE)).await? {
                versions.push(Version::new(version));
            }
        }
        Ok(versions)
    }

    async fn load(&self, name: &str, version: &str) -> Result<Option<Arc<Manifest>>> {
        let path = self.recipe_path(name, version);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded recipe {}", path.display());
        parse_from(&bytes, &path.display().to_string()).map(|m| Some(Arc::new(m)))
    }
}

#[async_trait]
impl RecipeSource for DirectorySource {
    async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>> {
        let version = match constraint.exact() {
            Some(exact) => Some(exact.clone()),
            None => {
                let versions = self.versions(name).await?;
                constraint.best_match(&versions).cloned()
            }
        };

        let found = match version {
            Some(version) => self.load(name, version.as_str()).await?,
            None => None,
        };

        found.ok_or_else(|| Error::RecipeNotFound {
            name: name.to_string(),
            constraint: constraint.to_string(),
        })
    }

    async fn fetch_artifact(&self, request: &ArtifactRequest) -> Result<ArtifactHandle> {
        let path = self
            .root
            .join(&request.package.name)
            .join(&request.package.version)
            .join(PACKAGES_DIR)
            .join(&request.package_id);

        if tokio::fs::try_exists(&path).await? {
            return Ok(ArtifactHandle {
                package: request.package.clone(),
                package_id: request.package_id.clone(),
                location: path.display().to_string(),
            });
        }

        Err(Error::ArtifactUnavailable {
            package: request.package.clone(),
            package_id: request.package_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::PackageId;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn write_recipe(root: &Path, name: &str, version: &str, extra: &str) {
        let dir = root.join(name).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(RECIPE_FILE),
            format!("name = \"{}\"\nversion = \"{}\"\n{}", name, version, extra),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_exact_and_range() {
        let temp = TempDir::new().unwrap();
        write_recipe(temp.path(), "zlib", "1.2.11", "");
        write_recipe(temp.path(), "zlib", "1.2.12", "");
        write_recipe(temp.path(), "zlib", "2.0.0", "");
        // A version directory without a recipe is ignored
        std::fs::create_dir_all(temp.path().join("zlib").join("3.0.0")).unwrap();

        let source = DirectorySource::new(temp.path());
        let exact = source
            .fetch("zlib", &VersionConstraint::parse("1.2.11").unwrap())
            .await
            .unwrap();
        assert_eq!(exact.version(), "1.2.11");

        let range = source
            .fetch("zlib", &VersionConstraint::parse("[>=1.2 <2]").unwrap())
            .await
            .unwrap();
        assert_eq!(range.version(), "1.2.12");

        let any = source.fetch("zlib", &VersionConstraint::Any).await.unwrap();
        assert_eq!(any.version(), "2.0.0");
    }

    #[tokio::test]
    async fn test_missing_package() {
        let temp = TempDir::new().unwrap();
        let source = DirectorySource::new(temp.path());
        let err = source
            .fetch("openssl", &VersionConstraint::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RecipeNotFound { .. }));
    }

    #[tokio::test]
    async fn test_malformed_recipe_names_path() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("zlib").join("1.2.11");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(RECIPE_FILE), "version = \"1.2.11\"").unwrap();

        let err = DirectorySource::new(temp.path())
            .fetch("zlib", &VersionConstraint::parse("1.2.11").unwrap())
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::MalformedManifest { ref manifest, .. } if manifest.ends_with(RECIPE_FILE))
        );
    }

    #[tokio::test]
    async fn test_fetch_artifact() {
        let temp = TempDir::new().unwrap();
        write_recipe(temp.path(), "zlib", "1.2.11", "");
        let packages = temp.path().join("zlib").join("1.2.11").join(PACKAGES_DIR);
        std::fs::create_dir_all(packages.join("abc123")).unwrap();

        let source = DirectorySource::new(temp.path());
        let mut request = ArtifactRequest {
            package: PackageId::new("zlib", "1.2.11"),
            package_id: "abc123".to_string(),
            options: BTreeMap::new(),
            settings: BTreeMap::new(),
        };
        let handle = source.fetch_artifact(&request).await.unwrap();
        assert!(handle.location.ends_with("abc123"));

        request.package_id = "def456".to_string();
        assert!(matches!(
            source.fetch_artifact(&request).await.unwrap_err(),
            Error::ArtifactUnavailable { .. }
        ));
    }
}
