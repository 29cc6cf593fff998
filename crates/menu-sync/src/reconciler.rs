//! # Sync Reconciler
//!
//! Decides, per mutation, whether it goes straight to the catalog service or
//! into the pending queue, and replays the queue once the service is back.
//!
//! ## Mutation State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Validating ──invalid──────────────────────────────────────► Failed    │
//! │       │                                                                 │
//! │       ├── temp_ id (edit) ───────────────────────┐                      │
//! │       ▼                                          │                      │
//! │   Probing ──offline──────────────────────────────┤                      │
//! │       │ online                                   │                      │
//! │       ▼                                          ▼                      │
//! │   WritingRemote ──any failure──────────────► WritingLocal               │
//! │       │ ok                                       │ (image escalation,   │
//! │       ▼                                          │  quota fallback)     │
//! │     Done ◄───────────────────────────────────────┘                      │
//! │                                                                         │
//! │   Reconciling (replay): probe once, then one create per queued item,    │
//! │   strictly in stored order. Only succeeded ids leave the queue.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every transition is logged and recorded in the outcome's `trace`.
//!
//! ## Exclusion
//! An item id can be part of at most one running operation. A second
//! operation on the same id fails fast with [`SyncError::Busy`]. Replays are
//! serialized against each other.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use menu_core::validation::validate_item_id;
use menu_core::{validate_draft, ImageRef, ItemId, MenuItem, MenuItemDraft};
use menu_store::{LocalStore, SaveOutcome, StoreError};

use crate::api::{ImageUpload, ItemPayload, RemoteCatalog};
use crate::config::{MenuConfig, TimeoutSettings};
use crate::error::{SyncError, SyncResult};
use crate::images::{validate_upload, EmbedOutcome, ImagePolicy};
use crate::probe::{ConnectivityProber, ProbeReport};

// =============================================================================
// States and Trace
// =============================================================================

/// Stage of a reconciler operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    Validating,
    Probing,
    WritingRemote,
    WritingLocal,
    Reconciling,
    Done,
    Failed,
}

/// Records and logs state transitions of one operation.
struct Trace {
    operation: &'static str,
    states: Vec<SyncState>,
}

impl Trace {
    fn new(operation: &'static str) -> Self {
        Trace {
            operation,
            states: Vec::new(),
        }
    }

    fn enter(&mut self, state: SyncState) {
        debug!(
            operation = self.operation,
            from = ?self.states.last(),
            to = ?state,
            "Sync state transition"
        );
        self.states.push(state);
    }

    /// Moves to `Failed` if the result is an error.
    fn check<T>(&mut self, result: SyncResult<T>) -> SyncResult<T> {
        if let Err(ref e) = result {
            debug!(operation = self.operation, error = %e, "Operation failed");
            self.enter(SyncState::Failed);
        }
        result
    }

    fn finish(mut self) -> Vec<SyncState> {
        self.enter(SyncState::Done);
        self.states
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Where a create or edit ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// Written to the catalog service. `item` is the stored copy when the
    /// service returned one.
    Remote { item: Option<MenuItem> },

    /// Queued locally.
    Pending {
        item: MenuItem,
        save: SaveOutcome,
        /// Why the remote write did not happen.
        reason: String,
        image: Option<EmbedOutcome>,
    },
}

/// Result of a create or edit.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub destination: Destination,
    pub trace: Vec<SyncState>,
}

impl MutationOutcome {
    pub fn is_remote(&self) -> bool {
        matches!(self.destination, Destination::Remote { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.destination, Destination::Pending { .. })
    }

    /// The item as it now exists, when known.
    pub fn item(&self) -> Option<&MenuItem> {
        match &self.destination {
            Destination::Remote { item } => item.as_ref(),
            Destination::Pending { item, .. } => Some(item),
        }
    }

    /// Messages the user should see.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Destination::Pending { save, image, .. } = &self.destination {
            if let Some(EmbedOutcome::Dropped { reason }) = image {
                warnings.push(format!("Image was not saved: {}", reason));
            }
            warnings.extend(save.warning());
        }
        warnings
    }
}

/// What a delete did.
#[derive(Debug, Clone, PartialEq)]
pub enum Deletion {
    /// Deleted on the catalog service.
    Remote,

    /// A pending item was dropped from the queue.
    Local { remaining: usize, save: SaveOutcome },

    /// Service unreachable; the id was recorded for a later retry.
    Deferred { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub deletion: Deletion,
    pub trace: Vec<SyncState>,
}

/// Per-item result of a replay.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayResult {
    Created { server_item: Option<MenuItem> },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEntry {
    pub temp_id: ItemId,
    pub food_name: String,
    pub result: ReplayResult,
}

/// Result of replaying the pending queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub probe: ProbeReport,

    /// False when the service was offline and nothing was sent.
    pub attempted: bool,

    pub succeeded: usize,
    pub failed: usize,
    pub entries: Vec<ReplayEntry>,

    /// Outcome of writing the reduced queue back.
    pub save: Option<SaveOutcome>,

    pub trace: Vec<SyncState>,
}

impl ReplayReport {
    fn skipped(probe: ProbeReport, trace: Vec<SyncState>) -> Self {
        ReplayReport {
            probe,
            attempted: false,
            succeeded: 0,
            failed: 0,
            entries: Vec::new(),
            save: None,
            trace,
        }
    }

    /// Temporary id → server id for every item the service echoed back.
    pub fn id_mapping(&self) -> Vec<(ItemId, ItemId)> {
        self.entries
            .iter()
            .filter_map(|e| match &e.result {
                ReplayResult::Created {
                    server_item: Some(item),
                } => Some((e.temp_id.clone(), item.id.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ItemId, &str)> {
        self.entries.iter().filter_map(|e| match &e.result {
            ReplayResult::Failed { error } => Some((&e.temp_id, error.as_str())),
            _ => None,
        })
    }
}

/// Result of retrying recorded deletions.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionReport {
    pub probe: ProbeReport,
    pub attempted: bool,
    pub deleted: Vec<ItemId>,
    pub failed: Vec<(ItemId, String)>,
}

/// Items first, then deletions.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSummary {
    pub items: ReplayReport,
    pub deletions: DeletionReport,
}

/// A change to an existing item.
#[derive(Debug, Clone, Default)]
pub struct ItemEdit {
    pub draft: MenuItemDraft,

    /// Replacement picture.
    pub image: Option<ImageUpload>,

    /// Picture the item has now. Carried onto a queued edit when no
    /// replacement is given.
    pub current_image: Option<ImageRef>,
}

// =============================================================================
// In-flight Guard
// =============================================================================

type InFlightSet = Arc<StdMutex<HashSet<ItemId>>>;

fn lock_set(set: &InFlightSet) -> MutexGuard<'_, HashSet<ItemId>> {
    set.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks an id as busy until dropped.
struct InFlight {
    set: InFlightSet,
    id: ItemId,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        lock_set(&self.set).remove(&self.id);
    }
}

fn store_error(err: StoreError) -> SyncError {
    if err.is_not_found() {
        SyncError::NotFound(err.to_string())
    } else {
        SyncError::Storage(err)
    }
}

fn unavailable(err: StoreError) -> SaveOutcome {
    SaveOutcome::Unavailable {
        reason: err.to_string(),
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Routes mutations between the catalog service and the pending queue.
#[derive(Clone)]
pub struct Reconciler {
    remote: Arc<dyn RemoteCatalog>,
    prober: ConnectivityProber,
    store: LocalStore,
    images: ImagePolicy,
    timeouts: TimeoutSettings,
    in_flight: InFlightSet,
    replay_lock: Arc<Mutex<()>>,
}

impl Reconciler {
    pub fn new(
        remote: Arc<dyn RemoteCatalog>,
        prober: ConnectivityProber,
        store: LocalStore,
        config: &MenuConfig,
    ) -> Self {
        Reconciler {
            remote,
            prober,
            store,
            images: ImagePolicy::from_settings(&config.images),
            timeouts: config.timeouts.clone(),
            in_flight: Arc::new(StdMutex::new(HashSet::new())),
            replay_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn prober(&self) -> &ConnectivityProber {
        &self.prober
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    fn acquire(&self, id: &ItemId) -> SyncResult<InFlight> {
        if !lock_set(&self.in_flight).insert(id.clone()) {
            warn!(id = %id, "Rejecting concurrent operation");
            return Err(SyncError::Busy(id.clone()));
        }
        Ok(InFlight {
            set: self.in_flight.clone(),
            id: id.clone(),
        })
    }

    /// Shrinks an image for embedding, off the async workers.
    async fn embed(&self, image: Option<ImageUpload>) -> SyncResult<Option<EmbedOutcome>> {
        let Some(upload) = image else {
            return Ok(None);
        };

        let under_pressure = self.store.usage().await.under_pressure();
        let policy = self.images.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            policy.embed(&upload.bytes, &upload.mime, under_pressure)
        })
        .await
        .map_err(|e| SyncError::ImageFailed(e.to_string()))??;

        Ok(Some(outcome))
    }

    fn check_upload(&self, image: Option<&ImageUpload>) -> SyncResult<()> {
        match image {
            Some(img) => validate_upload(&img.bytes, &img.mime, self.images.max_upload_bytes),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates an item, directly if possible and as a pending item otherwise.
    pub async fn create(
        &self,
        draft: &MenuItemDraft,
        image: Option<ImageUpload>,
    ) -> SyncResult<MutationOutcome> {
        let mut trace = Trace::new("create");

        trace.enter(SyncState::Validating);
        let validated = trace.check(validate_draft(draft).map_err(SyncError::from))?;
        trace.check(self.check_upload(image.as_ref()))?;

        trace.enter(SyncState::Probing);
        let probe = self.prober.check().await;

        let reason = if probe.is_online {
            trace.enter(SyncState::WritingRemote);
            let payload = ItemPayload::from_validated(&validated, image.clone());
            match self.remote.create(payload, self.timeouts.write()).await {
                Ok(item) => {
                    info!(food_name = %validated.food_name, "Created menu item");
                    return Ok(MutationOutcome {
                        destination: Destination::Remote { item },
                        trace: trace.finish(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Direct create failed, queuing locally");
                    e.to_string()
                }
            }
        } else {
            probe.summary()
        };

        trace.enter(SyncState::WritingLocal);
        let image = trace.check(self.embed(image).await)?;
        let image_ref = image.clone().and_then(EmbedOutcome::into_image);
        let item = validated.into_pending(ItemId::temporary(), image_ref, None, Utc::now());

        let save = self
            .store
            .pending_items()
            .append(item.clone())
            .await
            .unwrap_or_else(unavailable);
        info!(id = %item.id, reason = %reason, "Menu item queued");

        Ok(MutationOutcome {
            destination: Destination::Pending {
                item,
                save,
                reason,
                image,
            },
            trace: trace.finish(),
        })
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Edits an item.
    ///
    /// Pending items are edited in place without contacting the service.
    /// A server item whose update cannot be applied gets a pending edit that
    /// names it as `originalId`.
    pub async fn update(&self, id: &str, edit: ItemEdit) -> SyncResult<MutationOutcome> {
        let mut trace = Trace::new("update");

        trace.enter(SyncState::Validating);
        let id = trace.check(validate_item_id(id).map_err(SyncError::from))?;
        let validated = trace.check(validate_draft(&edit.draft).map_err(SyncError::from))?;
        trace.check(self.check_upload(edit.image.as_ref()))?;
        let _guard = trace.check(self.acquire(&id))?;

        let pending = self.store.pending_items();

        if id.is_temporary() {
            trace.enter(SyncState::WritingLocal);
            let mut queued = trace.check(
                pending
                    .find(&id)
                    .await
                    .map_err(store_error)
                    .and_then(|found| {
                        found.ok_or_else(|| SyncError::NotFound(format!("Pending item {}", id)))
                    }),
            )?;

            let image = trace.check(self.embed(edit.image).await)?;
            if let Some(outcome) = &image {
                queued.image = outcome.image().cloned();
            }
            validated.apply_to(&mut queued, Utc::now());
            queued.last_error = None;

            let save = trace.check(pending.update(queued.clone()).await.map_err(store_error))?;
            info!(id = %id, "Edited pending item");

            return Ok(MutationOutcome {
                destination: Destination::Pending {
                    item: queued,
                    save,
                    reason: "item has not been published yet".to_string(),
                    image,
                },
                trace: trace.finish(),
            });
        }

        trace.enter(SyncState::Probing);
        let probe = self.prober.check().await;

        let reason = if probe.is_online {
            trace.enter(SyncState::WritingRemote);
            let payload = ItemPayload::from_validated(&validated, edit.image.clone());
            match self.remote.update(&id, payload).await {
                Ok(item) => {
                    info!(id = %id, "Updated menu item");
                    return Ok(MutationOutcome {
                        destination: Destination::Remote { item },
                        trace: trace.finish(),
                    });
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "Direct update failed, queuing edit");
                    e.to_string()
                }
            }
        } else {
            probe.summary()
        };

        trace.enter(SyncState::WritingLocal);
        let existing = trace.check(pending.find_by_original(&id).await.map_err(store_error))?;
        let image = trace.check(self.embed(edit.image).await)?;
        let image_ref = match &image {
            Some(outcome) => outcome.image().cloned(),
            None => existing
                .as_ref()
                .and_then(|e| e.image.clone())
                .or(edit.current_image),
        };

        let now = Utc::now();
        let (item, save) = match existing {
            Some(mut queued) => {
                let _queued = trace.check(self.acquire(&queued.id))?;
                validated.apply_to(&mut queued, now);
                queued.image = image_ref;
                queued.last_error = None;
                let save = pending
                    .update(queued.clone())
                    .await
                    .unwrap_or_else(unavailable);
                (queued, save)
            }
            None => {
                let item =
                    validated.into_pending(ItemId::temporary(), image_ref, Some(id.clone()), now);
                let save = pending.append(item.clone()).await.unwrap_or_else(unavailable);
                (item, save)
            }
        };
        info!(id = %item.id, original_id = %id, "Edit queued");

        Ok(MutationOutcome {
            destination: Destination::Pending {
                item,
                save,
                reason,
                image,
            },
            trace: trace.finish(),
        })
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes an item.
    ///
    /// A `temp_` id only touches the pending queue. Any other id gets exactly
    /// one remote delete; if the service cannot be reached the id is
    /// recorded for [`Reconciler::replay_deletions`].
    pub async fn delete(&self, id: &str) -> SyncResult<DeleteOutcome> {
        let mut trace = Trace::new("delete");

        trace.enter(SyncState::Validating);
        let id = trace.check(validate_item_id(id).map_err(SyncError::from))?;
        let _guard = trace.check(self.acquire(&id))?;

        if id.is_temporary() {
            trace.enter(SyncState::WritingLocal);
            let (rest, save) =
                trace.check(self.store.pending_items().remove(&id).await.map_err(store_error))?;
            info!(id = %id, remaining = rest.len(), "Removed pending item");

            return Ok(DeleteOutcome {
                deletion: Deletion::Local {
                    remaining: rest.len(),
                    save,
                },
                trace: trace.finish(),
            });
        }

        trace.enter(SyncState::WritingRemote);
        match self.remote.delete(&id).await {
            Ok(()) => {
                info!(id = %id, "Deleted menu item");
                Ok(DeleteOutcome {
                    deletion: Deletion::Remote,
                    trace: trace.finish(),
                })
            }
            Err(e) if e.is_connectivity() => {
                trace.enter(SyncState::WritingLocal);
                trace.check(
                    self.store
                        .pending_deletions()
                        .add(id.clone())
                        .await
                        .map_err(store_error),
                )?;
                warn!(id = %id, error = %e, "Delete deferred until the service is reachable");

                Ok(DeleteOutcome {
                    deletion: Deletion::Deferred {
                        reason: e.to_string(),
                    },
                    trace: trace.finish(),
                })
            }
            Err(e) => trace.check(Err(e)),
        }
    }

    // =========================================================================
    // Replay
    // =========================================================================

    /// Replays the whole pending queue.
    pub async fn replay(&self) -> SyncResult<ReplayReport> {
        self.replay_matching(None).await
    }

    /// Replays a single pending item.
    pub async fn replay_one(&self, id: &str) -> SyncResult<ReplayReport> {
        let id = validate_item_id(id)?;
        if self.store.pending_items().find(&id).await?.is_none() {
            return Err(SyncError::NotFound(format!("Pending item {}", id)));
        }
        self.replay_matching(Some(id)).await
    }

    async fn replay_matching(&self, only: Option<ItemId>) -> SyncResult<ReplayReport> {
        let _replay = self.replay_lock.lock().await;
        let mut trace = Trace::new("replay");

        trace.enter(SyncState::Reconciling);
        let probe = self.prober.check().await;
        if !probe.is_online {
            info!(status = %probe.summary(), "Service offline, replay skipped");
            return Ok(ReplayReport::skipped(probe, trace.finish()));
        }

        let queue = self.store.pending_items().load().await?;
        let batch: Vec<&MenuItem> = queue
            .iter()
            .filter(|item| only.as_ref().map_or(true, |id| &item.id == id))
            .collect();
        info!(count = batch.len(), "Replaying pending items");

        let mut succeeded = HashSet::new();
        let mut failures = HashMap::new();
        let mut entries = Vec::with_capacity(batch.len());
        // Published ids stay busy until the queue no longer holds them.
        let mut published = Vec::new();

        for item in batch {
            let result = match self.acquire(&item.id) {
                Ok(guard) => {
                    let result = self.replay_item(&item.id).await;
                    if result.is_ok() {
                        published.push(guard);
                    }
                    result
                }
                Err(e) => Err(e),
            };

            let result = match result {
                Ok(server_item) => {
                    debug!(id = %item.id, "Replayed pending item");
                    succeeded.insert(item.id.clone());
                    ReplayResult::Created { server_item }
                }
                Err(e) => {
                    warn!(id = %item.id, error = %e, "Replay failed");
                    failures.insert(item.id.clone(), e.to_string());
                    ReplayResult::Failed {
                        error: e.to_string(),
                    }
                }
            };

            entries.push(ReplayEntry {
                temp_id: item.id.clone(),
                food_name: item.food_name.clone(),
                result,
            });
        }

        let save = self
            .store
            .pending_items()
            .apply_replay(&succeeded, &failures)
            .await?;

        drop(published);

        info!(
            succeeded = succeeded.len(),
            failed = failures.len(),
            "Replay finished"
        );

        Ok(ReplayReport {
            probe,
            attempted: true,
            succeeded: succeeded.len(),
            failed: failures.len(),
            entries,
            save: Some(save),
            trace: trace.finish(),
        })
    }

    /// Publishes one queued item, read again under its guard so an edit
    /// saved since the queue was loaded is the one sent.
    async fn replay_item(&self, id: &ItemId) -> SyncResult<Option<MenuItem>> {
        let item = self
            .store
            .pending_items()
            .find(id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| SyncError::NotFound(format!("Pending item {}", id)))?;
        let payload = self.replay_payload(&item).await?;
        self.remote.create(payload, self.timeouts.replay()).await
    }

    /// Payload for one queued item. A picture the catalog already serves is
    /// downloaded again; when that fails the item is sent without it.
    async fn replay_payload(&self, item: &MenuItem) -> SyncResult<ItemPayload> {
        let mut payload = ItemPayload::from_pending(item)?;
        if let Some(image) = item.image.as_ref().filter(|i| !i.is_embedded()) {
            match self.remote.fetch_image(image, self.timeouts.replay()).await {
                Ok(upload) => payload.image = Some(upload),
                Err(e) => warn!(
                    id = %item.id,
                    image = %image.as_str(),
                    error = %e,
                    "Existing image unavailable, replaying without it"
                ),
            }
        }
        Ok(payload)
    }

    /// Retries recorded deletions. A 404 counts as done.
    pub async fn replay_deletions(&self) -> SyncResult<DeletionReport> {
        let deletions = self.store.pending_deletions();
        let queued = deletions.load().await?;

        let probe = self.prober.check().await;
        if !probe.is_online || queued.is_empty() {
            return Ok(DeletionReport {
                attempted: probe.is_online,
                probe,
                deleted: Vec::new(),
                failed: Vec::new(),
            });
        }

        let mut deleted = Vec::new();
        let mut failed = Vec::new();

        for id in queued {
            let result = match self.acquire(&id) {
                Ok(_guard) => match self.remote.delete(&id).await {
                    Err(SyncError::NotFound(_)) => Ok(()),
                    other => other,
                },
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    deletions.remove(&id).await?;
                    deleted.push(id);
                }
                Err(e) => {
                    warn!(id = %id, error = %e, "Deferred delete failed again");
                    failed.push((id, e.to_string()));
                }
            }
        }

        info!(deleted = deleted.len(), failed = failed.len(), "Deletion replay finished");
        Ok(DeletionReport {
            probe,
            attempted: true,
            deleted,
            failed,
        })
    }

    /// Replays queued items, then recorded deletions.
    pub async fn sync_all(&self) -> SyncResult<SyncSummary> {
        let items = self.replay().await?;
        let deletions = self.replay_deletions().await?;
        Ok(SyncSummary { items, deletions })
    }

    // =========================================================================
    // Maintenance and Lookup
    // =========================================================================

    /// Drops embedded images from every pending item.
    pub async fn strip_images(&self) -> SyncResult<(usize, SaveOutcome)> {
        Ok(self.store.pending_items().strip_images().await?)
    }

    /// Loads an item for editing.
    ///
    /// Pending items come from the queue. Server items are fetched, falling
    /// back to a queued edit of the same item when the fetch fails.
    pub async fn fetch_item(&self, id: &str) -> SyncResult<MenuItem> {
        let id = validate_item_id(id)?;
        let pending = self.store.pending_items();

        if let Some(item) = pending.find(&id).await? {
            return Ok(item);
        }
        if id.is_temporary() {
            return Err(SyncError::NotFound(format!("Pending item {}", id)));
        }

        match self.remote.get(&id).await {
            Ok(item) => Ok(item),
            Err(e) => match pending.find_by_original(&id).await? {
                Some(item) => {
                    debug!(id = %id, error = %e, "Using queued edit");
                    Ok(item)
                }
                None => Err(e),
            },
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
