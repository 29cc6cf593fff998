//! # Item Catalog View
//!
//! Produces the list the user sees: remote items plus everything still in
//! the pending queue, filtered and sorted.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /api/menu-items ──ok──────► remote items ──┐                       │
//! │          │                                      ├──► merge ──► filter   │
//! │          └──fail──► sample items (Fallback) ────┤        ──► sort       │
//! │                                                 │                       │
//! │  pending store ─────────────────────────────────┘                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use menu_core::catalog::{self, CatalogFilter};
use menu_core::samples::sample_items;
use menu_core::{ItemId, MenuItem};
use menu_store::LocalStore;

use crate::api::RemoteCatalog;
use crate::error::SyncResult;

/// Where the non-pending part of a listing came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ListingSource {
    Remote,
    Fallback { reason: String },
}

/// A merged, filtered and sorted listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogListing {
    pub items: Vec<MenuItem>,
    pub source: ListingSource,
    pub online: bool,

    /// Items waiting in the pending queue, before filtering.
    pub pending_count: usize,

    /// Deletes recorded while the service was unreachable.
    pub deferred_deletions: Vec<ItemId>,
}

impl CatalogListing {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ListingSource::Fallback { .. })
    }

    /// True if the item's delete has not reached the service yet.
    pub fn is_awaiting_delete(&self, item: &MenuItem) -> bool {
        self.deferred_deletions.contains(&item.id)
    }
}

/// Read side of the catalog.
#[derive(Clone)]
pub struct CatalogView {
    remote: Arc<dyn RemoteCatalog>,
    store: LocalStore,
}

impl CatalogView {
    pub fn new(remote: Arc<dyn RemoteCatalog>, store: LocalStore) -> Self {
        CatalogView { remote, store }
    }

    /// Every item known to this device, unfiltered, plus where the remote
    /// part came from.
    async fn merged(&self) -> SyncResult<(Vec<MenuItem>, ListingSource, usize)> {
        let (remote, source) = match self.remote.list().await {
            Ok(items) => {
                debug!(count = items.len(), "Fetched remote catalog");
                (items, ListingSource::Remote)
            }
            Err(e) => {
                warn!(error = %e, "Catalog fetch failed, showing sample items");
                (
                    sample_items(),
                    ListingSource::Fallback {
                        reason: e.to_string(),
                    },
                )
            }
        };

        let pending = self.store.pending_items().load().await?;
        let pending_count = pending.len();
        Ok((catalog::merge(remote, pending), source, pending_count))
    }

    /// Builds the listing for a filter.
    pub async fn list(&self, filter: &CatalogFilter) -> SyncResult<CatalogListing> {
        let (items, source, pending_count) = self.merged().await?;
        let deferred_deletions = self.store.pending_deletions().load().await?;

        Ok(CatalogListing {
            items: filter.apply(&items),
            online: source == ListingSource::Remote,
            source,
            pending_count,
            deferred_deletions,
        })
    }

    /// Distinct categories across the unfiltered listing.
    pub async fn categories(&self) -> SyncResult<Vec<String>> {
        let (items, _, _) = self.merged().await?;
        Ok(catalog::categories(&items))
    }
}
