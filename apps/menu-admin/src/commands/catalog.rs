//! Read-only catalog commands.

use std::fmt::Write as _;

use serde::Serialize;

use menu_core::{CatalogFilter, ItemId, MenuItem};
use menu_store::StorageUsage;
use menu_sync::{ListingSource, ProbeReport, TokenInfo};

use super::{format_item_detail, format_item_line, CommandOutput};
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    catalog_url: String,
    probe: ProbeReport,
    pending_count: usize,
    deferred_deletions: Vec<ItemId>,
    storage: StorageUsage,
    signed_in: bool,
    session_expires_in_secs: Option<u64>,
}

/// `status`: connectivity, queue and storage at a glance.
pub async fn status(state: &AppState) -> AppResult<CommandOutput> {
    let probe = state.reconciler.prober().check().await;
    let store = &state.store;
    let pending_count = store.pending_items().count().await?;
    let deferred_deletions = store.pending_deletions().load().await?;
    let storage = store.usage().await;
    // An unreadable token shows as signed out rather than failing the command.
    let token: Option<TokenInfo> = state.auth.token_info().await.unwrap_or(None);

    let view = StatusView {
        catalog_url: state.config.catalog_url().to_string(),
        probe,
        pending_count,
        deferred_deletions,
        storage,
        signed_in: token.as_ref().is_some_and(|t| !t.is_expired()),
        session_expires_in_secs: token.as_ref().and_then(TokenInfo::remaining_secs),
    };

    let mut text = String::new();
    let _ = writeln!(text, "Catalog:    {} ({})", view.catalog_url, view.probe.summary());
    let _ = writeln!(text, "Pending:    {} item(s)", view.pending_count);
    let _ = writeln!(text, "Deletes:    {} deferred", view.deferred_deletions.len());
    let _ = writeln!(
        text,
        "Storage:    {} of {} bytes ({:.1}%)",
        view.storage.used,
        view.storage.total,
        view.storage.percent_used()
    );
    if view.storage.under_pressure() {
        let _ = writeln!(text, "            storage is nearly full, new images will be reduced");
    }
    let session = match (&token, view.signed_in) {
        (Some(_), true) => format!(
            "signed in{}",
            view.session_expires_in_secs
                .map(|s| format!(", expires in {}m", s / 60))
                .unwrap_or_default()
        ),
        (Some(_), false) => "session expired".to_string(),
        (None, _) => "signed out".to_string(),
    };
    let _ = write!(text, "Session:    {}", session);

    CommandOutput::new(text, &view)
}

/// `list`: remote items (or samples when offline) merged with the queue.
pub async fn list(state: &AppState, filter: &CatalogFilter) -> AppResult<CommandOutput> {
    let listing = state.catalog.list(filter).await?;

    let mut text = String::new();
    if let ListingSource::Fallback { reason } = &listing.source {
        let _ = writeln!(text, "Catalog service unavailable ({}), showing sample items", reason);
    }
    for item in &listing.items {
        let mut line = format_item_line(item);
        if listing.is_awaiting_delete(item) {
            line.push_str("  [delete pending]");
        }
        let _ = writeln!(text, "{}", line);
    }
    let _ = write!(
        text,
        "{} item(s), {} pending",
        listing.items.len(),
        listing.pending_count
    );

    CommandOutput::new(text, &listing)
}

pub async fn categories(state: &AppState) -> AppResult<CommandOutput> {
    let categories = state.catalog.categories().await?;
    CommandOutput::new(categories.join("\n"), &categories)
}

/// `show`: the queued copy when there is one, else the server copy.
pub async fn show(state: &AppState, id: &str) -> AppResult<CommandOutput> {
    let item: MenuItem = state.reconciler.fetch_item(id).await?;
    CommandOutput::new(format_item_detail(&item), &item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use menu_core::{Money, Prices, SizeTier};
    use menu_sync::MenuConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn offline_state() -> AppState {
        let mut config = MenuConfig::default();
        config.api.catalog_url = "http://127.0.0.1:9".to_string();
        config.api.auth_url = "http://127.0.0.1:9/api".to_string();
        AppState::in_memory(config).unwrap()
    }

    fn queued(name: &str) -> MenuItem {
        MenuItem {
            id: ItemId::temporary(),
            restaurant_id: "r1".into(),
            restaurant_name: "Local".into(),
            food_name: name.into(),
            category: "Pizza".into(),
            prices: Prices::new().with(SizeTier::Small, Money::from_cents(899)),
            image: None,
            created_at: None,
            updated_at: None,
            is_pending: true,
            original_id: None,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn test_status_offline() {
        let state = offline_state();
        state.store.pending_items().append(queued("Veggie")).await.unwrap();

        let out = status(&state).await.unwrap();
        assert_eq!(out.json["probe"]["isOnline"], false);
        assert_eq!(out.json["pendingCount"], 1);
        assert_eq!(out.json["signedIn"], false);
        assert!(out.text.contains("Pending:    1 item(s)"));
        assert!(out.text.contains("signed out"));
    }

    #[tokio::test]
    async fn test_list_falls_back_to_samples() {
        let state = offline_state();
        state.store.pending_items().append(queued("Zesty Veggie")).await.unwrap();

        let out = list(&state, &CatalogFilter::default()).await.unwrap();
        assert!(out.text.starts_with("Catalog service unavailable"));
        assert!(out.text.contains("Zesty Veggie"));
        assert!(out.text.contains("[pending]"));
        assert_eq!(out.json["source"]["kind"], "fallback");
    }

    #[tokio::test]
    async fn test_show_remote_item() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/menu-items/srv1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_id": "srv1",
                "restaurantId": "r1",
                "restaurantName": "Napoli",
                "foodName": "Margherita",
                "category": "Pizza",
                "prices": { "small": 9.99 }
            })))
            .mount(&server)
            .await;

        let mut config = MenuConfig::default();
        config.api.catalog_url = server.uri();
        let state = AppState::in_memory(config).unwrap();

        let out = show(&state, "srv1").await.unwrap();
        assert!(out.text.contains("Name:        Margherita"));
        assert!(out.text.contains("Prices:      small $9.99"));
        assert_eq!(out.json["foodName"], "Margherita");
    }

    #[tokio::test]
    async fn test_show_missing_pending_item() {
        let state = offline_state();
        let err = show(&state, "temp_0_missing").await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::NotFound);
    }
}
