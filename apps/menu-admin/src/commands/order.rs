//! `order`: builds up the local cart from catalog items.
//!
//! Items are looked up in the merged listing, so sample items work while
//! offline. Pending items are listed but cannot be ordered.

use std::fmt::Write as _;

use serde::Serialize;

use menu_core::{Cart, CartTotals, CatalogFilter};

use super::CommandOutput;
use crate::args::OrderLine;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderView<'a> {
    cart: &'a Cart,
    totals: CartTotals,
}

pub async fn order(state: &AppState, lines: &[OrderLine], clear: bool) -> AppResult<CommandOutput> {
    let carts = state.store.cart();
    let mut cart = carts.load().await?;
    if clear {
        cart.clear();
    }

    if !lines.is_empty() {
        let listing = state.catalog.list(&CatalogFilter::default()).await?;
        for line in lines {
            let item = listing
                .items
                .iter()
                .find(|i| i.id.as_str() == line.item_id)
                .ok_or_else(|| AppError::not_found("Menu item", &line.item_id))?;
            cart.add_item(item, line.size, line.quantity)?;
        }
    }

    carts.save(&cart).await?;

    let totals = CartTotals::from(&cart);
    let mut text = String::new();
    if cart.is_empty() {
        let _ = write!(text, "Cart is empty");
    } else {
        for line in &cart.items {
            let _ = writeln!(
                text,
                "{:>3} x {:<24} {:<7} {:>8} {:>9}  {}",
                line.quantity,
                line.food_name,
                line.size.as_str(),
                line.unit_price.to_string(),
                line.line_total().to_string(),
                line.restaurant_name
            );
        }
        let _ = write!(
            text,
            "{} line(s), {} item(s), total {}",
            totals.line_count, totals.total_quantity, totals.total
        );
    }

    CommandOutput::new(text, &OrderView { cart: &cart, totals })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use menu_core::SizeTier;
    use menu_sync::MenuConfig;

    fn offline_state() -> AppState {
        let mut config = MenuConfig::default();
        config.api.catalog_url = "http://127.0.0.1:9".to_string();
        AppState::in_memory(config).unwrap()
    }

    fn line(id: &str, size: SizeTier, quantity: i64) -> OrderLine {
        OrderLine {
            item_id: id.to_string(),
            size,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_order_sample_items_offline() {
        let state = offline_state();

        let out = order(&state, &[line("mock1", SizeTier::Small, 2)], false)
            .await
            .unwrap();
        assert!(out.text.ends_with("1 line(s), 2 item(s), total $19.98"));

        // Persisted between invocations.
        let out = order(&state, &[line("mock2", SizeTier::Large, 1)], false)
            .await
            .unwrap();
        assert_eq!(out.json["totals"]["lineCount"], 2);
        assert_eq!(out.json["totals"]["totalQuantity"], 3);
    }

    #[tokio::test]
    async fn test_order_clear() {
        let state = offline_state();
        order(&state, &[line("mock3", SizeTier::Medium, 1)], false)
            .await
            .unwrap();

        let out = order(&state, &[], true).await.unwrap();
        assert_eq!(out.text, "Cart is empty");
        assert!(state.store.cart().load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_unknown_item() {
        let state = offline_state();
        let err = order(&state, &[line("nope", SizeTier::Small, 1)], false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_order_rejects_pending_item() {
        let state = offline_state();
        let mut item = menu_core::samples::sample_items().remove(0);
        item.id = menu_core::ItemId::temporary();
        item.is_pending = true;
        let id = item.id.to_string();
        state.store.pending_items().append(item).await.unwrap();

        let err = order(&state, &[line(&id, SizeTier::Small, 1)], false)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CartError);
    }
}
