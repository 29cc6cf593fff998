//! # Connectivity Monitor
//!
//! Background task that re-probes the catalog service on a timer and
//! publishes the result. Optionally replays the pending queue when the
//! service comes back.
//!
//! ## Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────────────┐   tick (every interval_secs, missed ticks delayed)   │
//! │   │   select!    │──────────────────────┐                               │
//! │   └──────┬───────┘                      ▼                               │
//! │          │                      prober.check()                          │
//! │          │ shutdown                     │                               │
//! │          ▼                              ├── offline → online and        │
//! │        exit                             │   auto_replay: sync_all()     │
//! │                                         ▼                               │
//! │                              watch::Sender<MonitorStatus>               │
//! │                                         │                               │
//! │                                         ▼                               │
//! │                              MonitorEventEmitter                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MonitorSettings;
use crate::error::{SyncError, SyncResult};
use crate::probe::ProbeReport;
use crate::reconciler::{Reconciler, SyncSummary};

// =============================================================================
// Status
// =============================================================================

/// What the monitor last observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub online: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ProbeReport>,

    /// Items still waiting in the pending queue.
    pub pending_count: usize,

    /// Probes run since start.
    pub checks: u64,

    /// Automatic replays run since start.
    pub replays: u64,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receives monitor events (a UI, a log sink, a test).
pub trait MonitorEventEmitter: Send + Sync {
    /// Emits the status after every probe.
    fn emit_status(&self, status: &MonitorStatus);

    /// Emits the result of an automatic replay.
    fn emit_replay(&self, summary: &SyncSummary);

    /// Emits a background failure.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter.
pub struct NoOpEmitter;

impl MonitorEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &MonitorStatus) {}
    fn emit_replay(&self, _summary: &SyncSummary) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Monitor
// =============================================================================

/// Periodic connectivity checker.
pub struct ConnectivityMonitor {
    reconciler: Reconciler,
    interval: Duration,
    auto_replay: bool,
    emitter: Arc<dyn MonitorEventEmitter>,
}

impl ConnectivityMonitor {
    pub fn new(reconciler: Reconciler, settings: &MonitorSettings) -> Self {
        Self::with_emitter(reconciler, settings, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        reconciler: Reconciler,
        settings: &MonitorSettings,
        emitter: Arc<dyn MonitorEventEmitter>,
    ) -> Self {
        ConnectivityMonitor {
            reconciler,
            interval: Duration::from_secs(settings.interval_secs.max(1)),
            auto_replay: settings.auto_replay,
            emitter,
        }
    }

    /// Spawns the loop. The first probe runs immediately.
    pub fn start(self) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (status_tx, status_rx) = watch::channel(MonitorStatus::default());

        info!(
            interval_secs = self.interval.as_secs(),
            auto_replay = self.auto_replay,
            "Connectivity monitor starting"
        );
        let task = tokio::spawn(self.run(status_tx, shutdown_rx));

        MonitorHandle {
            shutdown_tx,
            status_rx,
            task,
        }
    }

    async fn run(self, status_tx: watch::Sender<MonitorStatus>, mut shutdown_rx: mpsc::Receiver<()>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut status = MonitorStatus::default();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(&mut status).await;
                    status_tx.send_replace(status.clone());
                    self.emitter.emit_status(&status);
                }

                _ = shutdown_rx.recv() => {
                    info!("Connectivity monitor stopping");
                    break;
                }
            }
        }
    }

    async fn tick(&self, status: &mut MonitorStatus) {
        let was_online = status.report.as_ref().map(|r| r.is_online);
        let report = self.reconciler.prober().check().await;

        status.checks += 1;
        status.online = report.is_online;
        status.report = Some(report);

        if self.auto_replay && status.online && was_online == Some(false) {
            info!("Catalog service is back, replaying pending changes");
            match self.reconciler.sync_all().await {
                Ok(summary) => {
                    status.replays += 1;
                    if summary.items.failed > 0 || !summary.deletions.failed.is_empty() {
                        warn!(
                            failed_items = summary.items.failed,
                            failed_deletions = summary.deletions.failed.len(),
                            "Automatic replay left work behind"
                        );
                    }
                    self.emitter.emit_replay(&summary);
                }
                Err(e) => {
                    error!(error = %e, "Automatic replay failed");
                    self.emitter.emit_error(&e.to_string(), e.is_retryable());
                }
            }
        }

        status.pending_count = match self.reconciler.store().pending_items().count().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Could not count pending items");
                self.emitter.emit_error(&e.to_string(), false);
                status.pending_count
            }
        };

        debug!(online = status.online, pending = status.pending_count, "Monitor tick");
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Controls a running monitor.
pub struct MonitorHandle {
    shutdown_tx: mpsc::Sender<()>,
    status_rx: watch::Receiver<MonitorStatus>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Latest published status.
    pub fn status(&self) -> MonitorStatus {
        self.status_rx.borrow().clone()
    }

    /// A receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<MonitorStatus> {
        self.status_rx.clone()
    }

    /// Stops the loop and waits for it to finish.
    pub async fn shutdown(self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|e| SyncError::ChannelError(e.to_string()))?;

        self.task
            .await
            .map_err(|e| SyncError::ChannelError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ImageUpload, ItemPayload, RemoteCatalog};
    use crate::config::MenuConfig;
    use crate::probe::ConnectivityProber;
    use async_trait::async_trait;
    use chrono::Utc;
    use menu_core::validation::validate_draft;
    use menu_core::{ImageRef, ItemId, MenuItem, MenuItemDraft, SizeTier};
    use menu_store::LocalStore;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct Switchable {
        online: AtomicBool,
        creates: AtomicUsize,
    }

    impl Switchable {
        fn check(&self) -> SyncResult<()> {
            if self.online.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(SyncError::ConnectionFailed("connection refused".into()))
            }
        }
    }

    #[async_trait]
    impl RemoteCatalog for Switchable {
        async fn probe(&self) -> SyncResult<u16> {
            self.check().map(|_| 200)
        }

        async fn list(&self) -> SyncResult<Vec<MenuItem>> {
            self.check().map(|_| Vec::new())
        }

        async fn get(&self, id: &ItemId) -> SyncResult<MenuItem> {
            self.check()?;
            Err(SyncError::NotFound(id.to_string()))
        }

        async fn create(&self, _payload: ItemPayload, _timeout: Duration) -> SyncResult<Option<MenuItem>> {
            self.check()?;
            self.creates.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn update(&self, _id: &ItemId, _payload: ItemPayload) -> SyncResult<Option<MenuItem>> {
            self.check().map(|_| None)
        }

        async fn delete(&self, _id: &ItemId) -> SyncResult<()> {
            self.check()
        }

        async fn fetch_image(&self, image: &ImageRef, _timeout: Duration) -> SyncResult<ImageUpload> {
            self.check()?;
            Err(SyncError::NotFound(image.as_str().to_string()))
        }
    }

    #[derive(Default)]
    struct CountingEmitter {
        statuses: AtomicUsize,
        replays: AtomicUsize,
    }

    impl MonitorEventEmitter for CountingEmitter {
        fn emit_status(&self, _status: &MonitorStatus) {
            self.statuses.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_replay(&self, _summary: &SyncSummary) {
            self.replays.fetch_add(1, Ordering::SeqCst);
        }

        fn emit_error(&self, _message: &str, _retryable: bool) {}
    }

    fn queued_item() -> MenuItem {
        let draft = MenuItemDraft {
            restaurant_id: "64b7f0c2a1d3e4f5a6b7c8d9".into(),
            restaurant_name: "Pizza Palace".into(),
            food_name: "Margherita".into(),
            category: "Pizza".into(),
            ..Default::default()
        }
        .with_price(SizeTier::Small, "9.99");
        validate_draft(&draft)
            .unwrap()
            .into_pending(ItemId::temporary(), None, None, Utc::now())
    }

    async fn setup(auto_replay: bool) -> (Arc<Switchable>, Reconciler, MonitorSettings) {
        let remote = Arc::new(Switchable::default());
        let store = LocalStore::in_memory();
        store.pending_items().append(queued_item()).await.unwrap();

        let prober = ConnectivityProber::new(remote.clone());
        let reconciler = Reconciler::new(remote.clone(), prober, store, &MenuConfig::default());
        let settings = MonitorSettings {
            interval_secs: 1,
            auto_replay,
        };
        (remote, reconciler, settings)
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_replay_on_reconnect() {
        let (remote, reconciler, settings) = setup(true).await;
        let emitter = Arc::new(CountingEmitter::default());
        let handle = ConnectivityMonitor::with_emitter(reconciler, &settings, emitter.clone()).start();

        let mut rx = handle.subscribe();
        let status = rx.wait_for(|s| s.checks >= 1).await.unwrap().clone();
        assert!(!status.online);
        assert_eq!(status.pending_count, 1);

        remote.online.store(true, Ordering::SeqCst);
        let status = rx.wait_for(|s| s.online).await.unwrap().clone();
        assert_eq!(status.pending_count, 0);
        assert_eq!(status.replays, 1);

        assert_eq!(remote.creates.load(Ordering::SeqCst), 1);
        assert_eq!(emitter.replays.load(Ordering::SeqCst), 1);
        assert!(emitter.statuses.load(Ordering::SeqCst) >= 2);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_replay_without_opt_in() {
        let (remote, reconciler, settings) = setup(false).await;
        let handle = ConnectivityMonitor::new(reconciler, &settings).start();

        let mut rx = handle.subscribe();
        rx.wait_for(|s| s.checks >= 1).await.unwrap();

        remote.online.store(true, Ordering::SeqCst);
        let status = rx.wait_for(|s| s.online).await.unwrap().clone();
        assert_eq!(status.pending_count, 1);
        assert_eq!(status.replays, 0);
        assert_eq!(remote.creates.load(Ordering::SeqCst), 0);
        assert!(handle.status().online);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (_remote, reconciler, settings) = setup(false).await;
        let handle = ConnectivityMonitor::new(reconciler, &settings).start();
        handle.shutdown().await.unwrap();
    }
}
