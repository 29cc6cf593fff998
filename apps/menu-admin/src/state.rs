//! # Application State
//!
//! Everything a command needs, built once per process.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          AppState                                       │
//! │                                                                         │
//! │  MenuConfig ──► HttpCatalogClient ──┬──► ConnectivityProber             │
//! │                                     │            │                      │
//! │  LocalStore (SQLite, or memory) ────┼────────────┼──► Reconciler        │
//! │                                     ├──► CatalogView                    │
//! │                                     └──► AuthClient (session repo)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use menu_store::{DbConfig, LocalStore};
use menu_sync::{
    AuthClient, CatalogView, ConnectivityProber, HttpCatalogClient, MenuConfig, Reconciler,
};

use crate::error::{AppError, AppResult, ErrorCode};

pub struct AppState {
    pub config: MenuConfig,
    pub store: LocalStore,
    pub reconciler: Reconciler,
    pub catalog: CatalogView,
    pub auth: AuthClient,
}

impl AppState {
    /// Opens the configured store and wires up the clients.
    pub async fn init(config: MenuConfig) -> AppResult<Self> {
        config.validate()?;

        let store = match config.storage.resolved_path() {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        AppError::new(
                            ErrorCode::StorageError,
                            format!("Cannot create {}: {}", parent.display(), e),
                        )
                    })?;
                }
                info!(?path, "Opening local store");
                let db_config = DbConfig::new(path).capacity_bytes(config.storage.capacity_bytes);
                LocalStore::sqlite(db_config).await?
            }
            None => {
                warn!("No data directory available, pending changes will not survive this process");
                LocalStore::in_memory()
            }
        };

        Self::with_store(config, store)
    }

    /// Wires clients around an already opened store.
    pub fn with_store(config: MenuConfig, store: LocalStore) -> AppResult<Self> {
        let remote = Arc::new(HttpCatalogClient::from_config(&config)?);
        let prober = ConnectivityProber::new(remote.clone());
        let reconciler = Reconciler::new(remote.clone(), prober, store.clone(), &config);
        let catalog = CatalogView::new(remote, store.clone());
        let auth = AuthClient::from_config(&config, store.session())?;

        Ok(AppState {
            config,
            store,
            reconciler,
            catalog,
            auth,
        })
    }

    /// In-memory state for tests.
    pub fn in_memory(config: MenuConfig) -> AppResult<Self> {
        Self::with_store(config, LocalStore::in_memory())
    }
}
