//! Syntax grammar and theme definitions, fetched from a package CDN.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_CDN_BASE: &str = "https://cdn.jsdelivr.net/npm";
pub const GRAMMAR_PACKAGE: &str = "tm-grammars@1.17.3";
pub const THEME_PACKAGE: &str = "tm-themes@1.10.0";

/// Producer of grammar and theme documents for the asset cache.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn grammar(&self, language: &str) -> Result<Value>;
    async fn theme(&self, theme: &str) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct CdnAssetSource {
    client: Client,
    base_url: String,
}

impl Default for CdnAssetSource {
    fn default() -> Self {
        Self::new(DEFAULT_CDN_BASE)
    }
}

impl CdnAssetSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn grammar_url(&self, language: &str) -> String {
        format!("{}/{GRAMMAR_PACKAGE}/grammars/{language}.json", self.base_url)
    }

    pub fn theme_url(&self, theme: &str) -> String {
        format!("{}/{THEME_PACKAGE}/themes/{theme}.json", self.base_url)
    }

    async fn fetch(&self, url: &str) -> Result<Value> {
        debug!(url, "fetching asset");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("{url} returned an error status"))?;

        response
            .json()
            .await
            .with_context(|| format!("{url} did not return JSON"))
    }
}

#[async_trait]
impl AssetSource for CdnAssetSource {
    async fn grammar(&self, language: &str) -> Result<Value> {
        self.fetch(&self.grammar_url(language)).await
    }

    async fn theme(&self, theme: &str) -> Result<Value> {
        self.fetch(&self.theme_url(theme)).await
    }
}
