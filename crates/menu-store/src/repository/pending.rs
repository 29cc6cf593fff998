//! # Pending Items Repository
//!
//! The queue of menu items that exist only on this device.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    save_all(items)                                      │
//! │                                                                         │
//! │  items empty? ──yes──► remove key ──────────────────► Cleared           │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  set(pendingMenuItems, json) ──ok──────────────────► Saved              │
//! │       │ QuotaExceeded                                                   │
//! │       ▼                                                                 │
//! │  strip every imageUrl, set again ──ok──────────────► SavedWithoutImages │
//! │       │ any error                                                       │
//! │       ▼                                                                 │
//! │  Unavailable { reason }   (nothing written, caller warns the user)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Read Path
//! A payload that does not parse is deleted and treated as an empty queue,
//! so one corrupt write cannot wedge the client forever.
//!
//! Every read-modify-write method holds the store-wide write lock for its
//! whole duration.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use menu_core::{ItemId, MenuItem};

use crate::error::{StoreError, StoreResult};
use crate::storage::KeyValueStorage;
use crate::PENDING_ITEMS_KEY;

/// Result of persisting the pending queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SaveOutcome {
    /// Written as given.
    Saved,

    /// Written after dropping images to fit the quota.
    SavedWithoutImages { stripped: usize },

    /// Queue was empty and the key was removed.
    Cleared,

    /// Nothing could be written.
    Unavailable { reason: String },
}

impl SaveOutcome {
    /// Returns true if the queue on disk now matches what was asked for,
    /// possibly minus images.
    pub fn is_persisted(&self) -> bool {
        !matches!(self, SaveOutcome::Unavailable { .. })
    }

    /// User-facing warning, if any.
    pub fn warning(&self) -> Option<String> {
        match self {
            SaveOutcome::SavedWithoutImages { stripped } => Some(format!(
                "Local storage is nearly full: {} image(s) were dropped from pending items",
                stripped
            )),
            SaveOutcome::Unavailable { reason } => Some(format!(
                "Could not save pending items locally: {}",
                reason
            )),
            _ => None,
        }
    }
}

/// Repository for the pending items queue.
#[derive(Clone)]
pub struct PendingItemsRepository {
    storage: Arc<dyn KeyValueStorage>,
    write_lock: Arc<Mutex<()>>,
}

impl PendingItemsRepository {
    pub fn new(storage: Arc<dyn KeyValueStorage>, write_lock: Arc<Mutex<()>>) -> Self {
        PendingItemsRepository {
            storage,
            write_lock,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Loads the queue in stored order.
    ///
    /// Only backend failures are errors. A corrupt payload is discarded.
    pub async fn load(&self) -> StoreResult<Vec<MenuItem>> {
        let Some(raw) = self.storage.get(PENDING_ITEMS_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<MenuItem>>(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                warn!(error = %e, "Discarding corrupted pending items payload");
                if let Err(remove_err) = self.storage.remove(PENDING_ITEMS_KEY).await {
                    error!(?remove_err, "Failed to remove corrupted pending items");
                }
                Ok(Vec::new())
            }
        }
    }

    pub async fn find(&self, id: &ItemId) -> StoreResult<Option<MenuItem>> {
        Ok(self.load().await?.into_iter().find(|i| &i.id == id))
    }

    /// Finds the pending edit of a server item.
    pub async fn find_by_original(&self, original: &ItemId) -> StoreResult<Option<MenuItem>> {
        Ok(self
            .load()
            .await?
            .into_iter()
            .find(|i| i.original_id.as_ref() == Some(original)))
    }

    pub async fn count(&self) -> StoreResult<usize> {
        Ok(self.load().await?.len())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persists the whole queue. Never fails; see [`SaveOutcome`].
    pub async fn save_all(&self, items: &[MenuItem]) -> SaveOutcome {
        let _guard = self.write_lock.lock().await;
        self.save_locked(items).await
    }

    /// Appends an item to the end of the queue.
    pub async fn append(&self, item: MenuItem) -> StoreResult<SaveOutcome> {
        let _guard = self.write_lock.lock().await;

        let mut items = self.load().await?;
        info!(id = %item.id, queued = items.len() + 1, "Queuing pending item");
        items.push(item);
        Ok(self.save_locked(&items).await)
    }

    /// Replaces a queued item in place, keeping its position.
    pub async fn update(&self, item: MenuItem) -> StoreResult<SaveOutcome> {
        let _guard = self.write_lock.lock().await;

        let mut items = self.load().await?;
        let slot = items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| StoreError::not_found("Pending item", item.id.as_str()))?;
        *slot = item;
        Ok(self.save_locked(&items).await)
    }

    /// Removes an item. Returns the remaining queue once it is written.
    pub async fn remove(&self, id: &ItemId) -> StoreResult<(Vec<MenuItem>, SaveOutcome)> {
        let _guard = self.write_lock.lock().await;

        let mut items = self.load().await?;
        let before = items.len();
        items.retain(|i| &i.id != id);
        if items.len() == before {
            return Err(StoreError::not_found("Pending item", id.as_str()));
        }

        let outcome = self.save_locked(&items).await;
        Ok((items, outcome))
    }

    /// Applies the result of a replay pass.
    ///
    /// The queue is re-read so items queued while the pass ran survive.
    /// Succeeded ids are removed; failed ones get `lastError`.
    pub async fn apply_replay(
        &self,
        succeeded: &HashSet<ItemId>,
        failed: &HashMap<ItemId, String>,
    ) -> StoreResult<SaveOutcome> {
        let _guard = self.write_lock.lock().await;

        let mut items = self.load().await?;
        items.retain(|i| !succeeded.contains(&i.id));
        for item in items.iter_mut() {
            if let Some(reason) = failed.get(&item.id) {
                item.last_error = Some(reason.clone());
            }
        }

        debug!(
            removed = succeeded.len(),
            annotated = failed.len(),
            remaining = items.len(),
            "Applying replay results"
        );
        Ok(self.save_locked(&items).await)
    }

    /// Drops every embedded image to free space.
    pub async fn strip_images(&self) -> StoreResult<(usize, SaveOutcome)> {
        let _guard = self.write_lock.lock().await;

        let mut items = self.load().await?;
        let stripped = items
            .iter_mut()
            .map(|i| i.strip_embedded_image())
            .filter(|stripped| *stripped)
            .count();
        if stripped == 0 {
            return Ok((0, SaveOutcome::Saved));
        }

        info!(stripped, "Removing embedded images from pending items");
        Ok((stripped, self.save_locked(&items).await))
    }

    async fn save_locked(&self, items: &[MenuItem]) -> SaveOutcome {
        if items.is_empty() {
            return match self.storage.remove(PENDING_ITEMS_KEY).await {
                Ok(()) => SaveOutcome::Cleared,
                Err(e) => SaveOutcome::Unavailable {
                    reason: e.to_string(),
                },
            };
        }

        match self.write(items).await {
            Ok(()) => return SaveOutcome::Saved,
            Err(e) if e.is_quota_exceeded() => {
                warn!(error = %e, "Pending items exceed quota, retrying without images");
            }
            Err(e) => {
                error!(error = %e, "Failed to save pending items");
                return SaveOutcome::Unavailable {
                    reason: e.to_string(),
                };
            }
        }

        let mut stripped = 0;
        let without_images: Vec<MenuItem> = items
            .iter()
            .cloned()
            .map(|mut item| {
                if item.image.take().is_some() {
                    stripped += 1;
                }
                item
            })
            .collect();

        match self.write(&without_images).await {
            Ok(()) => SaveOutcome::SavedWithoutImages { stripped },
            Err(e) => {
                error!(error = %e, "Failed to save pending items without images");
                SaveOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn write(&self, items: &[MenuItem]) -> StoreResult<()> {
        let json = serde_json::to_string(items)?;
        self.storage.set(PENDING_ITEMS_KEY, &json).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
