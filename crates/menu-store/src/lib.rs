//! # menu-store: Local Pending Store
//!
//! Device-local persistence for everything the client must remember while
//! the catalog service is unreachable.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Menu Admin Data Flow                             │
//! │                                                                         │
//! │  Reconciler (menu-sync)                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   menu-store (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  LocalStore   │    │  Repositories │    │   Storage    │  │   │
//! │  │   │  (local.rs)   │    │               │    │  backends    │  │   │
//! │  │   │               │    │ pending items │    │              │  │   │
//! │  │   │ write lock    │───►│ deletions     │───►│ MemoryStorage│  │   │
//! │  │   │ accessors     │    │ session       │    │ Database     │  │   │
//! │  │   │               │    │ cart          │    │ (SQLite)     │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stored Keys
//!
//! | Key                | Value                               |
//! |--------------------|-------------------------------------|
//! | `pendingMenuItems` | JSON array of pending `MenuItem`s   |
//! | `pendingDeletions` | JSON array of server ids to delete  |
//! | `foodAppToken`     | Session bearer token                |
//! | `foodAppCart`      | JSON cart                           |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use menu_store::{DbConfig, LocalStore};
//!
//! let store = LocalStore::sqlite(DbConfig::new("path/to/menu.db")).await?;
//! let queued = store.pending_items().load().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod local;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod storage;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use local::LocalStore;
pub use pool::{Database, DbConfig};
pub use storage::{KeyValueStorage, MemoryStorage, StorageUsage};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::deletions::PendingDeletionsRepository;
pub use repository::pending::{PendingItemsRepository, SaveOutcome};
pub use repository::session::SessionRepository;

// =============================================================================
// Constants
// =============================================================================

/// Default storage quota: 5 MiB.
pub const DEFAULT_CAPACITY_BYTES: u64 = 5 * 1024 * 1024;

pub const PENDING_ITEMS_KEY: &str = "pendingMenuItems";

pub const PENDING_DELETIONS_KEY: &str = "pendingDeletions";

pub const SESSION_TOKEN_KEY: &str = "foodAppToken";

pub const CART_KEY: &str = "foodAppCart";
