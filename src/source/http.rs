// src/source/http.rs

//! Recipe source backed by an HTTP recipe index
//!
//! Layout under the base URL:
//!
//! - `<base>/<name>/<version>/recipe.toml` - one recipe
//! - `<base>/<name>/index.json` - `{"versions": ["1.2.11", ...]}`, consulted
//!   only for non-exact constraints

use super::RecipeSource;
use super::retry::{RetryPolicy, with_retry};
use crate::error::{Error, Result};
use crate::recipe::{Manifest, parse_from};
use crate::version::{Version, VersionConstraint};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Version listing for one package
#[derive(Debug, Deserialize)]
struct VersionIndex {
    versions: Vec<String>,
}

pub struct HttpSource {
    base: Url,
    client: Client,
    policy: RetryPolicy,
}

impl HttpSource {
    /// Create a source rooted at `base`
    pub fn new(base: &str, policy: RetryPolicy) -> Result<Self> {
        let mut base = Url::parse(base)
            .map_err(|e| Error::Config(format!("invalid remote URL {}: {}", base, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Config(format!("remote URL {} cannot be a base", base)));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(policy.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base,
            client,
            policy,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn recipe_url(&self, name: &str, version: &str) -> Result<Url> {
        self.join(name, version, &format!("{}/{}/recipe.toml", name, version))
    }

    pub fn index_url(&self, name: &str) -> Result<Url> {
        self.join(name, "*", &format!("{}/index.json", name))
    }

    fn join(&self, name: &str, constraint: &str, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|e| Error::FetchFailed {
            name: name.to_string(),
            constraint: constraint.to_string(),
            reason: format!("bad URL for {}: {}", path, e),
            transient: false,
        })
    }

    /// GET one URL, classifying failures for the retry loop
    async fn get_bytes(&self, url: &Url, name: &str, constraint: &str) -> Result<Vec<u8>> {
        let failed = |reason: String, transient: bool| Error::FetchFailed {
            name: name.to_string(),
            constraint: constraint.to_string(),
            reason,
            transient,
        };

        debug!("GET {}", url);
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            let transient = e.is_timeout() || e.is_connect() || e.is_request();
            failed(format!("{}: {}", url, e), transient)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::RecipeNotFound {
                name: name.to_string(),
                constraint: constraint.to_string(),
            });
        }
        if !status.is_success() {
            let transient = status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
            return Err(failed(format!("HTTP {} from {}", status, url), transient));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| failed(format!("failed to read response from {}: {}", url, e), true))?;
        Ok(bytes.to_vec())
    }

    async fn resolve_version(&self, name: &str, constraint: &VersionConstraint) -> Result<Version> {
        if let Some(exact) = constraint.exact() {
            return Ok(exact.clone());
        }

        let label = constraint.to_string();
        let url = self.index_url(name)?;
        let what = format!("Index fetch for {}", name);
        let bytes = with_retry(&self.policy, &what, || self.get_bytes(&url, name, &label)).await?;
        let index: VersionIndex = serde_json::from_slice(&bytes).map_err(|e| Error::FetchFailed {
            name: name.to_string(),
            constraint: label.clone(),
            reason: format!("invalid index at {}: {}", url, e),
            transient: false,
        })?;

        let versions: Vec<Version> = index.versions.into_iter().map(Version::new).collect();
        constraint
            .best_match(&versions)
            .cloned()
            .ok_or(Error::RecipeNotFound {
                name: name.to_string(),
                constraint: label,
            })
    }
}

#[async_trait]
impl RecipeSource for HttpSource {
    async fn fetch(&self, name: &str, constraint: &VersionConstraint) -> Result<Arc<Manifest>> {
        let version = self.resolve_version(name, constraint).await?;
        let label = constraint.to_string();
        let url = self.recipe_url(name, version.as_str())?;
        let what = format!("Recipe fetch for {}/{}", name, version);
        let bytes = with_retry(&self.policy, &what, || self.get_bytes(&url, name, &label)).await?;

        info!("Fetched recipe {}/{} from {}", name, version, self.base);
        parse_from(&bytes, url.as_str()).map(Arc::new)
    }
}
