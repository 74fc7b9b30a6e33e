// src/config.rs

//! Configuration file (`kiln.toml`)
//!
//! ```toml
//! [settings]
//! os = "Linux"
//! build_type = "Release"
//!
//! [sources]
//! recipe_dirs = ["recipes"]
//! remotes = ["https://recipes.example.com/center"]
//!
//! [sources.retry]
//! max_retries = 3
//! base_delay_ms = 1000
//! timeout_secs = 30
//!
//! [resolver]
//! max_concurrent_fetches = 8
//! ```
//!
//! A missing file means defaults. Command-line flags are layered on top by
//! the caller.

use crate::error::{Error, Result};
use crate::resolver::{ResolverConfig, Settings};
use crate::source::{ChainSource, DirectorySource, HttpSource, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "kiln.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Global settings applied to every package
    pub settings: Settings,
    pub sources: SourceConfig,
    pub resolver: ResolverConfig,
}

/// Where recipes come from, in priority order: directories, then remotes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub recipe_dirs: Vec<PathBuf>,
    pub remotes: Vec<String>,
    pub retry: RetryPolicy,
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one, `kiln.toml` in the current
    /// directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(CONFIG_FILE_NAME);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        // Relative recipe directories are relative to the config file
        if let Some(base) = path.parent() {
            for dir in &mut config.sources.recipe_dirs {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for remote in &self.sources.remotes {
            let url = Url::parse(remote)
                .map_err(|e| Error::Config(format!("invalid remote URL {}: {}", remote, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "remote {} must use http or https",
                    remote
                )));
            }
        }
        if self.resolver.max_concurrent_fetches == 0 {
            return Err(Error::Config(
                "resolver.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build the source chain: every recipe directory, then every remote
    pub fn source_chain(&self) -> Result<ChainSource> {
        let mut chain = ChainSource::new();
        for dir in &self.sources.recipe_dirs {
            chain.push(DirectorySource::new(dir));
        }
        for remote in &self.sources.remotes {
            chain.push(HttpSource::new(remote, self.sources.retry.clone())?);
        }
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
[settings]
os = "Linux"
build_type = "Release"

[sources]
recipe_dirs = ["recipes"]
remotes = ["https://recipes.example.com/center"]

[sources.retry]
max_retries = 5

[resolver]
max_concurrent_fetches = 2
"#,
        )
        .unwrap();

        assert_eq!(config.settings.get("os"), Some("Linux"));
        assert_eq!(config.sources.recipe_dirs, vec![PathBuf::from("recipes")]);
        assert_eq!(config.sources.retry.max_retries, 5);
        assert_eq!(config.sources.retry.base_delay_ms, 1000);
        assert_eq!(config.resolver.max_concurrent_fetches, 2);
        assert_eq!(config.source_chain().unwrap().len(), 2);
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
    }

    #[test]
    fn test_rejects_bad_remote() {
        let err = Config::parse("[sources]\nremotes = [\"ftp://example.com\"]\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(Config::parse("[sources]\nremotes = [\"::\"]\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(Config::parse("[resolver]\nthreads = 4\n").is_err());
        assert!(Config::parse("[resolver]\nmax_concurrent_fetches = 0\n").is_err());
    }

    #[test]
    fn test_recipe_dirs_relative_to_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[sources]\nrecipe_dirs = [\"recipes\", \"/abs\"]\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.sources.recipe_dirs[0], temp.path().join("recipes"));
        assert_eq!(config.sources.recipe_dirs[1], PathBuf::from("/abs"));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&temp.path().join("nope.toml"))).is_err());
    }
}
