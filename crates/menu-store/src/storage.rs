//! # Key/Value Storage Seam
//!
//! The single abstraction every local write goes through.
//!
//! ## Quota Accounting
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Storage Quota                                      │
//! │                                                                         │
//! │  used  = Σ (utf16_len(key) + utf16_len(value)) × 2 bytes                │
//! │  total = capacity (default 5 MiB)                                       │
//! │                                                                         │
//! │  set(key, value):                                                       │
//! │     used - old_entry + new_entry > total ?  ──► QuotaExceeded           │
//! │                                         no  ──► write                   │
//! │                                                                         │
//! │  available = used < 90% of total                                        │
//! │  (below that threshold the client is under "quota pressure")            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both backends ([`MemoryStorage`] and the SQLite [`crate::Database`])
//! apply exactly the same arithmetic, so behavior under pressure does not
//! depend on where the data lives.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::DEFAULT_CAPACITY_BYTES;

/// Fraction of capacity above which storage counts as under pressure.
pub const PRESSURE_THRESHOLD: f64 = 0.9;

// =============================================================================
// Usage
// =============================================================================

/// Storage usage estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    /// Bytes used by every key and value.
    pub used: u64,

    /// Capacity in bytes.
    pub total: u64,

    /// False once usage reaches 90% of capacity.
    pub available: bool,
}

impl StorageUsage {
    pub fn new(used: u64, total: u64) -> Self {
        StorageUsage {
            used,
            total,
            available: (used as f64) < PRESSURE_THRESHOLD * total as f64,
        }
    }

    /// Usage as a percentage of capacity.
    pub fn percent_used(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.used as f64 / self.total as f64 * 100.0
    }

    pub fn under_pressure(&self) -> bool {
        !self.available
    }
}

/// Bytes an entry occupies: two per UTF-16 code unit of key and value.
pub fn entry_size(key: &str, value: &str) -> u64 {
    ((key.encode_utf16().count() + value.encode_utf16().count()) * 2) as u64
}

/// Checks whether replacing `old` with `new` fits into `capacity`.
pub fn check_quota(used: u64, old: u64, new: u64, capacity: u64) -> StoreResult<()> {
    let required = used.saturating_sub(old) + new;
    if required > capacity {
        return Err(StoreError::QuotaExceeded { required, capacity });
    }
    Ok(())
}

// =============================================================================
// Storage Trait
// =============================================================================

/// String key/value storage with a finite capacity.
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a value. Fails with `QuotaExceeded` instead of writing
    /// partially.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Bytes currently used.
    async fn used_bytes(&self) -> StoreResult<u64>;

    fn capacity(&self) -> u64;

    async fn usage(&self) -> StoreResult<StorageUsage> {
        Ok(StorageUsage::new(self.used_bytes().await?, self.capacity()))
    }
}

// =============================================================================
// Memory Backend
// =============================================================================

/// In-process storage for tests and throwaway sessions.
#[derive(Debug)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
    capacity: u64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(capacity: u64) -> Self {
        MemoryStorage {
            entries: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Writes a value without quota checks (for corrupt-data tests).
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;

        let used: u64 = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
        let old = entries.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
        check_quota(used, old, entry_size(key, value), self.capacity)?;

        debug!(key = %key, bytes = entry_size(key, value), "Writing storage entry");
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn used_bytes(&self) -> StoreResult<u64> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum())
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
