//! Pending queue commands.

use std::fmt::Write as _;

use serde::Serialize;

use menu_core::{ItemId, MenuItem};
use menu_store::{SaveOutcome, StorageUsage};
use menu_sync::{DeletionReport, ReplayReport, ReplayResult, SyncSummary};

use super::{format_item_line, CommandOutput};
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PendingView {
    items: Vec<MenuItem>,
    deferred_deletions: Vec<ItemId>,
}

pub async fn pending(state: &AppState) -> AppResult<CommandOutput> {
    let view = PendingView {
        items: state.store.pending_items().load().await?,
        deferred_deletions: state.store.pending_deletions().load().await?,
    };

    let mut text = String::new();
    if view.items.is_empty() {
        let _ = writeln!(text, "No pending items");
    }
    for item in &view.items {
        let _ = writeln!(text, "{}", format_item_line(item));
    }
    for id in &view.deferred_deletions {
        let _ = writeln!(text, "delete {}", id);
    }
    let _ = write!(
        text,
        "{} pending item(s), {} deferred delete(s)",
        view.items.len(),
        view.deferred_deletions.len()
    );

    CommandOutput::new(text, &view)
}

// =============================================================================
// Replay
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayEntryView<'a> {
    temp_id: &'a ItemId,
    food_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_id: Option<&'a ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplayView<'a> {
    online: bool,
    attempted: bool,
    succeeded: usize,
    failed: usize,
    entries: Vec<ReplayEntryView<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    save: Option<&'a SaveOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deletions: Option<DeletionsView<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletionsView<'a> {
    attempted: bool,
    deleted: &'a [ItemId],
    failed: Vec<DeletionFailure<'a>>,
}

#[derive(Debug, Serialize)]
struct DeletionFailure<'a> {
    id: &'a ItemId,
    error: &'a str,
}

impl<'a> ReplayView<'a> {
    fn new(report: &'a ReplayReport, deletions: Option<&'a DeletionReport>) -> Self {
        let entries = report
            .entries
            .iter()
            .map(|e| {
                let (server_id, error) = match &e.result {
                    ReplayResult::Created { server_item } => {
                        (server_item.as_ref().map(|i| &i.id), None)
                    }
                    ReplayResult::Failed { error } => (None, Some(error.as_str())),
                };
                ReplayEntryView {
                    temp_id: &e.temp_id,
                    food_name: &e.food_name,
                    server_id,
                    error,
                }
            })
            .collect();

        ReplayView {
            online: report.probe.is_online,
            attempted: report.attempted,
            succeeded: report.succeeded,
            failed: report.failed,
            entries,
            save: report.save.as_ref(),
            deletions: deletions.map(|d| DeletionsView {
                attempted: d.attempted,
                deleted: &d.deleted,
                failed: d
                    .failed
                    .iter()
                    .map(|(id, error)| DeletionFailure { id, error })
                    .collect(),
            }),
        }
    }
}

fn format_replay(report: &ReplayReport) -> String {
    if !report.attempted {
        return format!(
            "Catalog service {}, nothing was sent",
            report.probe.summary()
        );
    }

    let mut text = String::new();
    for entry in &report.entries {
        match &entry.result {
            ReplayResult::Created {
                server_item: Some(item),
            } => {
                let _ = writeln!(text, "published '{}' {} -> {}", entry.food_name, entry.temp_id, item.id);
            }
            ReplayResult::Created { server_item: None } => {
                let _ = writeln!(text, "published '{}' {}", entry.food_name, entry.temp_id);
            }
            ReplayResult::Failed { error } => {
                let _ = writeln!(text, "failed    '{}' {}: {}", entry.food_name, entry.temp_id, error);
            }
        }
    }
    let _ = write!(
        text,
        "{} published, {} still pending",
        report.succeeded, report.failed
    );
    if let Some(warning) = report.save.as_ref().and_then(SaveOutcome::warning) {
        let _ = write!(text, "\nwarning: {}", warning);
    }
    text
}

/// Human summary of a full sync, shared with `watch`.
pub(crate) fn format_summary(summary: &SyncSummary) -> String {
    let mut text = format_replay(&summary.items);
    let deletions = &summary.deletions;
    if deletions.attempted && (!deletions.deleted.is_empty() || !deletions.failed.is_empty()) {
        let _ = write!(
            text,
            "\n{} deferred delete(s) applied, {} failed",
            deletions.deleted.len(),
            deletions.failed.len()
        );
        for (id, error) in &deletions.failed {
            let _ = write!(text, "\n  delete {}: {}", id, error);
        }
    }
    text
}

/// `replay [ID]`: one item, or the whole queue plus deferred deletions.
pub async fn replay(state: &AppState, id: Option<&str>) -> AppResult<CommandOutput> {
    match id {
        Some(id) => {
            let report = state.reconciler.replay_one(id).await?;
            CommandOutput::new(format_replay(&report), &ReplayView::new(&report, None))
        }
        None => {
            let summary = state.reconciler.sync_all().await?;
            CommandOutput::new(
                format_summary(&summary),
                &ReplayView::new(&summary.items, Some(&summary.deletions)),
            )
        }
    }
}

// =============================================================================
// Storage Maintenance
// =============================================================================

pub async fn usage(state: &AppState) -> AppResult<CommandOutput> {
    let usage: StorageUsage = state.store.usage().await;
    let mut text = format!(
        "{} of {} bytes used ({:.1}%), {} available",
        usage.used,
        usage.total,
        usage.percent_used(),
        usage.available
    );
    if usage.under_pressure() {
        text.push_str("\nstorage is nearly full, run `strip-images` or `replay`");
    }
    CommandOutput::new(text, &usage)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StripView {
    stripped: usize,
    save: SaveOutcome,
}

/// `strip-images`: drops embedded images to free space.
pub async fn strip_images(state: &AppState) -> AppResult<CommandOutput> {
    let (stripped, save) = state.reconciler.strip_images().await?;

    let mut text = format!("Removed {} embedded image(s) from pending items", stripped);
    if let Some(warning) = save.warning() {
        let _ = write!(text, "\nwarning: {}", warning);
    }
    CommandOutput::new(text, &StripView { stripped, save })
}
