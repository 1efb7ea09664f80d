use crate::core::cache::RateStore;
use crate::core::rate::CachedRate;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Keeps the cached rate as a small JSON document in a single file.
///
/// The file is not locked; concurrent writers from several processes race and
/// the last one wins.
#[derive(Debug, Clone)]
pub struct DiskRateStore {
    path: PathBuf,
}

impl DiskRateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_cached(&self) -> Result<Option<CachedRate>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cached: CachedRate = serde_json::from_slice(&bytes)?;
        if !cached.is_valid() {
            anyhow::bail!("stored rate {} is not positive", cached.rate);
        }
        Ok(Some(cached))
    }
}

#[async_trait]
impl RateStore for DiskRateStore {
    async fn load(&self) -> Option<CachedRate> {
        let res = self.read_cached().await;

        match res {
            Ok(Some(cached)) => {
                debug!("Cache HIT at {}", self.path.display());
                Some(cached)
            }
            Ok(None) => {
                debug!("Cache MISS at {}", self.path.display());
                None
            }
            Err(e) => {
                debug!("Ignoring unreadable cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn save(&self, rate: &CachedRate) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_vec(rate)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write cache file: {}", self.path.display()))?;
        debug!("Cache PUT at {}", self.path.display());
        Ok(())
    }
}
