//! Distribution acquisition: remote fetch, on-disk cache, dev override

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::config::CoreConfig;
use crate::distribution::{Distribution, ResolvedDistribution};
use crate::error::{LauncherError, Result};

/// Loads and caches the distribution index.
///
/// Fetch precedence when online: remote → parse → cache → overlay. When the
/// remote fails, the cached copy is used. Dev mode reads only the local dev
/// document and never touches the network.
#[derive(Debug)]
pub struct DistributionApi {
    config: CoreConfig,
    client: reqwest::Client,
    resolved: Option<ResolvedDistribution>,
}

impl DistributionApi {
    /// Create an API instance for the given configuration
    pub fn new(config: CoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("LauncherCore/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            config,
            client,
            resolved: None,
        })
    }

    /// The distribution, loading it on first call.
    ///
    /// The overlay is built once per load against the configured common and
    /// instance directories.
    pub async fn get_distribution(&mut self) -> Result<&ResolvedDistribution> {
        if self.resolved.is_none() {
            let raw = self.load_raw().await?;
            self.resolved = Some(self.resolve(raw)?);
        }
        self.resolved
            .as_ref()
            .ok_or_else(|| LauncherError::DistributionLoadFailed("no distribution loaded".into()))
    }

    /// Drop the remote copy in favor of a fresh fetch, but keep the current
    /// overlay when the whole refresh fails.
    pub async fn refresh_or_fallback(&mut self) -> Result<&ResolvedDistribution> {
        match self.load_raw().await {
            Ok(raw) => {
                self.resolved = Some(self.resolve(raw)?);
            }
            Err(e) if self.resolved.is_some() => {
                log::warn!("distribution refresh failed, keeping current copy: {e}");
            }
            Err(e) => return Err(e),
        }
        self.resolved
            .as_ref()
            .ok_or_else(|| LauncherError::DistributionLoadFailed("no distribution loaded".into()))
    }

    fn resolve(&self, raw: Distribution) -> Result<ResolvedDistribution> {
        ResolvedDistribution::resolve(raw, &self.config.common_dir, &self.config.instance_dir)
    }

    async fn load_raw(&self) -> Result<Distribution> {
        if self.config.dev_mode {
            return self.load_file(self.config.distribution_dev_path()).await;
        }

        match self.fetch_remote().await {
            Ok(raw) => Ok(raw),
            Err(e) => {
                log::warn!("remote distribution fetch failed: {e}; trying the cache");
                self.load_file(self.config.distribution_cache_path())
                    .await
                    .map_err(|cache_err| {
                        LauncherError::DistributionLoadFailed(format!(
                            "remote: {e}; cache: {cache_err}"
                        ))
                    })
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Distribution> {
        let response = self
            .client
            .get(&self.config.distribution_url)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        let raw: Distribution = serde_json::from_str(&body)?;
        if let Err(e) = self.write_cache(&body).await {
            log::warn!("could not cache the distribution: {e}");
        }
        Ok(raw)
    }

    async fn load_file(&self, path: PathBuf) -> Result<Distribution> {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| LauncherError::missing_file(path.display().to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write the cache through a temp file so readers never observe a
    /// half-written document.
    async fn write_cache(&self, body: &str) -> Result<()> {
        let path = self.config.distribution_cache_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(body.as_bytes()).await?;
        file.flush().await?;
        drop(file);
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }
}
