//! # Local Store
//!
//! One handle over a storage backend, shared by every component.
//!
//! All repositories handed out by a [`LocalStore`] (and its clones) share a
//! single write lock, so a replay pass and a user action can never
//! interleave their read-modify-write cycles on the same key.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::StoreResult;
use crate::pool::{Database, DbConfig};
use crate::repository::cart::CartRepository;
use crate::repository::deletions::PendingDeletionsRepository;
use crate::repository::pending::PendingItemsRepository;
use crate::repository::session::SessionRepository;
use crate::storage::{KeyValueStorage, MemoryStorage, StorageUsage};

/// Cloneable facade over a [`KeyValueStorage`] backend.
#[derive(Clone)]
pub struct LocalStore {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        LocalStore {
            storage,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Store backed by process memory with the default quota.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Opens (or creates) the SQLite-backed store.
    pub async fn sqlite(config: DbConfig) -> StoreResult<Self> {
        let db = Database::new(config).await?;
        info!(capacity = db.capacity(), "Local store ready");
        Ok(Self::new(Arc::new(db)))
    }

    // =========================================================================
    // Repository Accessors
    // =========================================================================

    pub fn pending_items(&self) -> PendingItemsRepository {
        PendingItemsRepository::new(self.storage.clone(), self.write_lock.clone())
    }

    pub fn pending_deletions(&self) -> PendingDeletionsRepository {
        PendingDeletionsRepository::new(self.storage.clone(), self.write_lock.clone())
    }

    pub fn session(&self) -> SessionRepository {
        SessionRepository::new(self.storage.clone())
    }

    pub fn cart(&self) -> CartRepository {
        CartRepository::new(self.storage.clone(), self.write_lock.clone())
    }

    /// Current usage estimate. Never fails; an unreadable backend reports
    /// as full.
    pub async fn usage(&self) -> StorageUsage {
        match self.storage.usage().await {
            Ok(usage) => usage,
            Err(e) => {
                tracing::warn!(error = %e, "Could not measure storage usage");
                let capacity = self.storage.capacity();
                StorageUsage::new(capacity, capacity)
            }
        }
    }

    pub fn storage(&self) -> &Arc<dyn KeyValueStorage> {
        &self.storage
    }
}
