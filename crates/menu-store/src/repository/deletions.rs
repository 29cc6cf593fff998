//! # Pending Deletions Repository
//!
//! Server item ids whose delete could not reach the service.
//!
//! Ids are unique and keep insertion order. The list is replayed by
//! `replay_deletions` once the service is reachable again.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use menu_core::ItemId;

use crate::error::StoreResult;
use crate::storage::KeyValueStorage;
use crate::PENDING_DELETIONS_KEY;

/// Repository for the deletion tombstones.
#[derive(Clone)]
pub struct PendingDeletionsRepository {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl PendingDeletionsRepository {
    pub fn new(storage: Arc<dyn KeyValueStorage>, write_lock: Arc<Mutex<()>>) -> Self {
        PendingDeletionsRepository {
            storage,
            write_lock,
        }
    }

    /// Loads the tombstones. A corrupt payload is dropped.
    pub async fn load(&self) -> StoreResult<Vec<ItemId>> {
        let Some(raw) = self.storage.get(PENDING_DELETIONS_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(ids) => Ok(ids),
            Err(e) => {
                warn!(error = %e, "Discarding corrupted pending deletions");
                self.storage.remove(PENDING_DELETIONS_KEY).await?;
                Ok(Vec::new())
            }
        }
    }

    pub async fn contains(&self, id: &ItemId) -> StoreResult<bool> {
        Ok(self.load().await?.contains(id))
    }

    /// Records a tombstone. Returns false if it was already queued.
    pub async fn add(&self, id: ItemId) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut ids = self.load().await?;
        if ids.contains(&id) {
            return Ok(false);
        }

        debug!(id = %id, "Queuing deletion");
        ids.push(id);
        self.write(&ids).await?;
        Ok(true)
    }

    /// Drops a tombstone once the server confirmed the delete.
    pub async fn remove(&self, id: &ItemId) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut ids = self.load().await?;
        ids.retain(|queued| queued != id);
        self.write(&ids).await
    }

    pub async fn clear(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.storage.remove(PENDING_DELETIONS_KEY).await
    }

    async fn write(&self, ids: &[ItemId]) -> StoreResult<()> {
        if ids.is_empty() {
            return self.storage.remove(PENDING_DELETIONS_KEY).await;
        }
        let json = serde_json::to_string(ids)?;
        self.storage.set(PENDING_DELETIONS_KEY, &json).await
    }
}
