//! Persistence abstraction for the single cached rate

use crate::core::rate::CachedRate;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait RateStore: Send + Sync {
    /// Returns the stored rate, or `None` when absent or unreadable.
    async fn load(&self) -> Option<CachedRate>;

    /// Overwrites whatever was stored before.
    async fn save(&self, rate: &CachedRate) -> Result<()>;
}
