//! # menu-sync: Offline-First Sync for the Menu Catalog
//!
//! Everything that talks to the network: the catalog client, connectivity
//! probing, the reconciler that decides between a direct write and the
//! pending queue, and the merged read view.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          menu-sync                                      │
//! │                                                                         │
//! │   create / edit / delete                    list(filter)                │
//! │          │                                       │                      │
//! │          ▼                                       ▼                      │
//! │  ┌───────────────┐   probe   ┌─────────────┐  ┌─────────────────┐       │
//! │  │  Reconciler   │──────────►│   Prober    │  │  CatalogView    │       │
//! │  │  (state mach.)│           └──────┬──────┘  │  merge + filter │       │
//! │  └──┬─────────┬──┘                  │         └───┬─────────┬───┘       │
//! │     │ online  │ offline / failure   │             │         │           │
//! │     ▼         ▼                     ▼             ▼         │           │
//! │  ┌────────────────┐  ┌──────────────────────────────────┐   │           │
//! │  │ ImagePolicy    │  │     RemoteCatalog (reqwest)      │   │           │
//! │  │ shrink + embed │  │  HEAD/GET/POST/PUT/DELETE        │   │           │
//! │  └───────┬────────┘  └──────────────────────────────────┘   │           │
//! │          ▼                                                  ▼           │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │        menu-store: pendingMenuItems, pendingDeletions            │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ConnectivityMonitor: timer ──► probe ──► watch channel (auto-replay)   │
//! │  AuthClient: login / register / profile against user-management         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - Background `ConnectivityMonitor`
//! - [`api`] - `RemoteCatalog` seam and the reqwest client
//! - [`auth`] - User-management client and token inspection
//! - [`catalog_view`] - Merged, filtered listing
//! - [`config`] - TOML configuration with env overrides
//! - [`error`] - Sync error types
//! - [`images`] - Image validation, resizing and embedding policy
//! - [`probe`] - Liveness probe
//! - [`reconciler`] - Mutation routing and replay
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use menu_sync::{ConnectivityProber, HttpCatalogClient, MenuConfig, Reconciler};
//! use menu_store::LocalStore;
//!
//! let config = MenuConfig::load_or_default(None);
//! let remote = Arc::new(HttpCatalogClient::from_config(&config)?);
//! let prober = ConnectivityProber::new(remote.clone());
//! let reconciler = Reconciler::new(remote, prober, LocalStore::in_memory(), &config);
//!
//! let outcome = reconciler.create(&draft, None).await?;
//! if outcome.is_pending() {
//!     println!("Saved offline; will sync later");
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod api;
pub mod auth;
pub mod catalog_view;
pub mod config;
pub mod error;
pub mod images;
pub mod probe;
pub mod reconciler;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{ConnectivityMonitor, MonitorEventEmitter, MonitorHandle, MonitorStatus, NoOpEmitter};
pub use api::{HttpCatalogClient, ImageUpload, ItemPayload, RemoteCatalog};
pub use auth::{AuthClient, Registration, RegistrationOutcome, RestaurantInfo, Role, TokenInfo, UserProfile};
pub use catalog_view::{CatalogListing, CatalogView, ListingSource};
pub use config::MenuConfig;
pub use error::{SyncError, SyncResult};
pub use images::{EmbedOutcome, ImagePolicy, NormalizedImage};
pub use probe::{ConnectivityProber, ProbeReport};
pub use reconciler::{
    DeleteOutcome, Deletion, DeletionReport, Destination, ItemEdit, MutationOutcome, Reconciler,
    ReplayReport, ReplayResult, SyncState, SyncSummary,
};
