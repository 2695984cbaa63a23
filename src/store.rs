//! Tracked item persistence used by the pipeline.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::models::TrackedItem;
use crate::utils::error::StoreError;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackedItemStore: Send + Sync {
    async fn get_tracked_items(&self) -> Result<Vec<TrackedItem>, StoreError>;

    /// Returns the counter after the increment.
    async fn increment_failure_count(&self, id: i64) -> Result<u32, StoreError>;

    async fn reset_failure_count(&self, id: i64) -> Result<(), StoreError>;

    async fn record_notified_price(&self, id: i64, price: Decimal) -> Result<(), StoreError>;
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RwLock<BTreeMap<i64, TrackedItem>>,
}

impl MemoryStore {
    pub fn new(items: impl IntoIterator<Item = TrackedItem>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().map(|item| (item.id, item)).collect()),
        }
    }

    pub async fn get(&self, id: i64) -> Option<TrackedItem> {
        self.items.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl TrackedItemStore for MemoryStore {
    async fn get_tracked_items(&self) -> Result<Vec<TrackedItem>, StoreError> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn increment_failure_count(&self, id: i64) -> Result<u32, StoreError> {
        let mut items = self.items.write().await;
        let item = items.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        item.consecutive_failures = item.consecutive_failures.saturating_add(1);
        Ok(item.consecutive_failures)
    }

    async fn reset_failure_count(&self, id: i64) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let item = items.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        item.consecutive_failures = 0;
        Ok(())
    }

    async fn record_notified_price(&self, id: i64, price: Decimal) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        let item = items.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        item.last_notified_price = Some(price);
        Ok(())
    }
}

/// JSON document store: a top-level array of tracked items, rewritten after
/// every update.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<TrackedItem>, StoreError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store file {} not found, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(StoreError::Io(format!("{}: {}", self.path.display(), e)));
            }
        };

        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw)
            .map_err(|e| StoreError::Corrupt(format!("{}: {}", self.path.display(), e)))
    }

    async fn save(&self, items: &[TrackedItem]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(items)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        // Write beside the target then rename so a crash never leaves half a file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| StoreError::Io(format!("{}: {}", self.path.display(), e)))?;

        debug!("Saved {} tracked items to {}", items.len(), self.path.display());
        Ok(())
    }

    async fn update<T>(
        &self,
        id: i64,
        apply: impl FnOnce(&mut TrackedItem) -> T + Send,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        let mut items = self.load().await?;
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(StoreError::NotFound { id })?;
        let value = apply(item);
        self.save(&items).await?;
        Ok(value)
    }
}

#[async_trait]
impl TrackedItemStore for JsonFileStore {
    async fn get_tracked_items(&self) -> Result<Vec<TrackedItem>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn increment_failure_count(&self, id: i64) -> Result<u32, StoreError> {
        self.update(id, |item| {
            item.consecutive_failures = item.consecutive_failures.saturating_add(1);
            item.consecutive_failures
        })
        .await
    }

    async fn reset_failure_count(&self, id: i64) -> Result<(), StoreError> {
        self.update(id, |item| item.consecutive_failures = 0).await
    }

    async fn record_notified_price(&self, id: i64, price: Decimal) -> Result<(), StoreError> {
        self.update(id, |item| item.last_notified_price = Some(price)).await
    }
}
