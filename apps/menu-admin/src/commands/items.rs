//! Create, edit and delete.
//!
//! Every change goes through the reconciler, which decides between a direct
//! write and the pending queue.

use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use menu_core::{MenuItem, MenuItemDraft};
use menu_sync::images::mime_for_extension;
use menu_sync::{Deletion, Destination, ImageUpload, ItemEdit, MutationOutcome, SyncState};

use super::CommandOutput;
use crate::args::ItemFields;
use crate::error::{AppError, AppResult, ErrorCode};
use crate::state::AppState;

/// JSON shape of a create or edit result.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MutationView<'a> {
    destination: &'static str,
    item: Option<&'a MenuItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
    warnings: Vec<String>,
    trace: &'a [SyncState],
}

impl<'a> MutationView<'a> {
    fn from_outcome(outcome: &'a MutationOutcome) -> Self {
        let (destination, reason) = match &outcome.destination {
            Destination::Remote { .. } => ("remote", None),
            Destination::Pending { reason, .. } => ("pending", Some(reason.as_str())),
        };
        MutationView {
            destination,
            item: outcome.item(),
            reason,
            warnings: outcome.warnings(),
            trace: &outcome.trace,
        }
    }
}

fn render(verb: &str, fallback_name: &str, outcome: &MutationOutcome) -> AppResult<CommandOutput> {
    let mut text = String::new();
    match &outcome.destination {
        Destination::Remote { item: Some(item) } => {
            let _ = write!(text, "{} '{}' ({})", verb, item.food_name, item.id);
        }
        Destination::Remote { item: None } => {
            let _ = write!(text, "{} '{}'", verb, fallback_name);
        }
        Destination::Pending { item, .. } if !outcome.trace.contains(&SyncState::Probing) => {
            let _ = write!(text, "{} pending item '{}' ({})", verb, item.food_name, item.id);
        }
        Destination::Pending { item, reason, .. } => {
            let _ = write!(
                text,
                "Catalog service unavailable ({}).\n'{}' saved locally as {} and will be published on the next replay",
                reason, item.food_name, item.id
            );
        }
    }
    for warning in outcome.warnings() {
        let _ = write!(text, "\nwarning: {}", warning);
    }

    CommandOutput::new(text, &MutationView::from_outcome(outcome))
}

/// Reads an image file and works out its MIME type from the extension.
pub(crate) async fn read_image(path: &Path) -> AppResult<ImageUpload> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let mime = mime_for_extension(ext).ok_or_else(|| {
        AppError::new(
            ErrorCode::ImageError,
            format!("Unsupported image type: {} (use jpg, png, gif or webp)", path.display()),
        )
    })?;
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AppError::new(
            ErrorCode::ImageError,
            format!("Cannot read {}: {}", path.display(), e),
        )
    })?;

    Ok(ImageUpload {
        bytes,
        mime: mime.to_string(),
    })
}

async fn image_for(fields: &ItemFields) -> AppResult<Option<ImageUpload>> {
    match &fields.image {
        Some(path) => Ok(Some(read_image(path).await?)),
        None => Ok(None),
    }
}

pub async fn create(state: &AppState, fields: &ItemFields) -> AppResult<CommandOutput> {
    let draft = fields.to_draft();
    let image = image_for(fields).await?;

    let outcome = state.reconciler.create(&draft, image).await?;
    render("Created", &draft.food_name, &outcome)
}

/// `edit`: loads the current item, overlays the given fields and saves.
///
/// When the item cannot be loaded because the service is unreachable, the
/// given fields alone must make a complete item.
pub async fn edit(state: &AppState, id: &str, fields: &ItemFields) -> AppResult<CommandOutput> {
    let (draft, current_image) = match state.reconciler.fetch_item(id).await {
        Ok(current) => {
            let mut draft = MenuItemDraft::from_item(&current);
            fields.apply_to(&mut draft);
            (draft, current.image)
        }
        Err(e) if e.is_connectivity() => {
            warn!(id, error = %e, "Current item unavailable, editing from the given fields");
            (fields.to_draft(), None)
        }
        Err(e) => return Err(e.into()),
    };
    let edit = ItemEdit {
        draft,
        image: image_for(fields).await?,
        current_image,
    };

    let name = edit.draft.food_name.clone();
    let outcome = state.reconciler.update(id, edit).await?;
    render("Updated", &name, &outcome)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteView<'a> {
    id: &'a str,
    deletion: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'a str>,
}

pub async fn delete(state: &AppState, id: &str) -> AppResult<CommandOutput> {
    let outcome = state.reconciler.delete(id).await?;

    let (text, view) = match &outcome.deletion {
        Deletion::Remote => (
            format!("Deleted {}", id),
            DeleteView {
                id,
                deletion: "remote",
                remaining: None,
                reason: None,
            },
        ),
        Deletion::Local { remaining, save } => {
            let mut text = format!("Removed pending item {} ({} still pending)", id, remaining);
            if let Some(warning) = save.warning() {
                let _ = write!(text, "\nwarning: {}", warning);
            }
            (
                text,
                DeleteView {
                    id,
                    deletion: "local",
                    remaining: Some(*remaining),
                    reason: None,
                },
            )
        }
        Deletion::Deferred { reason } => (
            format!(
                "Catalog service unavailable ({}).\nDelete of {} recorded and will be retried on the next replay",
                reason, id
            ),
            DeleteView {
                id,
                deletion: "deferred",
                remaining: None,
                reason: Some(reason),
            },
        ),
    };

    CommandOutput::new(text, &view)
}
