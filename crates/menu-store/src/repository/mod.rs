//! # Repository Module
//!
//! Typed access to each stored key.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Reconciler                                                             │
//! │       │                                                                 │
//! │       │  store.pending_items().append(item)                             │
//! │       ▼                                                                 │
//! │  PendingItemsRepository                                                 │
//! │  ├── load()          JSON ──► Vec<MenuItem>                             │
//! │  ├── append(item)    load + push + save under the write lock            │
//! │  ├── apply_replay()  drop succeeded, annotate failed                    │
//! │  └── save_all()      quota fallback, never errors                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  dyn KeyValueStorage (memory or SQLite)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`pending::PendingItemsRepository`] - Items created or edited offline
//! - [`deletions::PendingDeletionsRepository`] - Server ids awaiting delete
//! - [`session::SessionRepository`] - Auth token
//! - [`cart::CartRepository`] - Customer cart

pub mod cart;
pub mod deletions;
pub mod pending;
pub mod session;
