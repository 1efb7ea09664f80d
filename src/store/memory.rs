use crate::core::cache::RateStore;
use crate::core::rate::CachedRate;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory rate store, for embedding without a cache file and for tests
#[derive(Default)]
pub struct MemoryRateStore {
    inner: Mutex<Option<CachedRate>>,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(rate: CachedRate) -> Self {
        Self {
            inner: Mutex::new(Some(rate)),
            ..Self::default()
        }
    }

    pub async fn current(&self) -> Option<CachedRate> {
        *self.inner.lock().await
    }

    /// Number of `load` calls served so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of `save` calls served so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn load(&self) -> Option<CachedRate> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let cached = self.inner.lock().await.filter(CachedRate::is_valid);
        if cached.is_some() {
            debug!("Cache HIT");
        } else {
            debug!("Cache MISS");
        }
        cached
    }

    async fn save(&self, rate: &CachedRate) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        debug!("Cache PUT");
        *inner = Some(*rate);
        Ok(())
    }
}
