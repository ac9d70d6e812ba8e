//! In-memory snapshot of the scale configuration store

use shared::models::{ScaleConfig, normalize_scale_id};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::{ScaleStore, StoreResult};

struct Inner {
    store: ScaleStore,
    snapshot: RwLock<Arc<Vec<ScaleConfig>>>,
    invalidated: Notify,
}

/// Cached scale configuration
///
/// Writes go through the cache so the refresh loop picks them up
/// immediately instead of on the next interval.
#[derive(Clone)]
pub struct ScaleConfigCache {
    inner: Arc<Inner>,
}

impl ScaleConfigCache {
    pub fn new(store: ScaleStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                snapshot: RwLock::new(Arc::new(Vec::new())),
                invalidated: Notify::new(),
            }),
        }
    }

    /// Reload from the store; the previous snapshot survives a failed read
    pub async fn refresh(&self) -> StoreResult<usize> {
        let configs = self.inner.store.get_all().await?;
        let count = configs.len();
        *self.inner.snapshot.write().await = Arc::new(configs);
        debug!(count, "Scale config cache refreshed");
        Ok(count)
    }

    pub async fn snapshot(&self) -> Arc<Vec<ScaleConfig>> {
        self.inner.snapshot.read().await.clone()
    }

    pub async fn active(&self) -> Vec<ScaleConfig> {
        self.snapshot()
            .await
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect()
    }

    /// Case-insensitive lookup in the current snapshot
    pub async fn get(&self, scale_id: &str) -> Option<ScaleConfig> {
        let key = normalize_scale_id(scale_id);
        self.snapshot()
            .await
            .iter()
            .find(|c| c.key() == key)
            .cloned()
    }

    pub async fn save(&self, config: ScaleConfig) -> StoreResult<()> {
        self.inner.store.save(config).await?;
        self.invalidate();
        Ok(())
    }

    pub async fn delete(&self, scale_id: &str) -> StoreResult<bool> {
        let removed = self.inner.store.delete(scale_id).await?;
        self.invalidate();
        Ok(removed)
    }

    /// Force a reload on the next refresh cycle
    pub fn reload(&self) {
        self.invalidate();
    }

    fn invalidate(&self) {
        self.inner.invalidated.notify_one();
    }

    /// Refresh loop: every `interval`, or right after an invalidation
    pub async fn run_refresh(self, interval: Duration, token: CancellationToken) {
        loop {
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "Failed to refresh scale config cache");
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
                _ = self.inner.invalidated.notified() => {}
            }
        }
        info!("Scale config cache refresh stopped");
    }
}
