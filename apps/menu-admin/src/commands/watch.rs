//! `watch`: runs the connectivity monitor in the foreground until Ctrl-C.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use tracing::{info, warn};

use menu_sync::config::MonitorSettings;
use menu_sync::{ConnectivityMonitor, MonitorEventEmitter, MonitorStatus, SyncSummary};

use super::queue::format_summary;
use super::CommandOutput;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Prints transitions and replay results to stdout.
struct ConsoleEmitter {
    last_online: Mutex<Option<bool>>,
}

impl ConsoleEmitter {
    fn new() -> Self {
        ConsoleEmitter {
            last_online: Mutex::new(None),
        }
    }
}

impl MonitorEventEmitter for ConsoleEmitter {
    fn emit_status(&self, status: &MonitorStatus) {
        let mut last = self.last_online.lock().unwrap_or_else(PoisonError::into_inner);
        if *last == Some(status.online) {
            return;
        }
        *last = Some(status.online);

        let summary = status
            .report
            .as_ref()
            .map(|r| r.summary())
            .unwrap_or_else(|| "unknown".into());
        println!(
            "[{}] catalog service {}, {} pending",
            Local::now().format("%H:%M:%S"),
            summary,
            status.pending_count
        );
    }

    fn emit_replay(&self, summary: &SyncSummary) {
        println!("[{}] replayed pending changes", Local::now().format("%H:%M:%S"));
        println!("{}", format_summary(summary));
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        warn!(retryable, "{}", message);
    }
}

pub async fn watch(
    state: &AppState,
    interval_secs: Option<u64>,
    auto_replay: bool,
) -> AppResult<CommandOutput> {
    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C, stopping");
        }
    };
    watch_until(state, interval_secs, auto_replay, stop).await
}

/// Runs the monitor until `stop` completes.
pub(crate) async fn watch_until(
    state: &AppState,
    interval_secs: Option<u64>,
    auto_replay: bool,
    stop: impl Future<Output = ()>,
) -> AppResult<CommandOutput> {
    let settings = MonitorSettings {
        interval_secs: interval_secs.unwrap_or(state.config.monitor.interval_secs),
        auto_replay: auto_replay || state.config.monitor.auto_replay,
    };
    if settings.interval_secs == 0 {
        return Err(AppError::usage("--interval must be greater than 0"));
    }

    let monitor = ConnectivityMonitor::with_emitter(
        state.reconciler.clone(),
        &settings,
        Arc::new(ConsoleEmitter::new()),
    );
    let handle = monitor.start();

    stop.await;

    let status = handle.status();
    handle.shutdown().await?;
    info!(checks = status.checks, replays = status.replays, "Watch stopped");

    CommandOutput::new(
        format!(
            "Stopped after {} check(s), {} automatic replay(s)",
            status.checks, status.replays
        ),
        &status,
    )
}
