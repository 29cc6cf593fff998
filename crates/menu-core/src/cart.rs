//! # Cart
//!
//! The customer's order in progress.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  "Add to Cart" (item, size) ──► add_item()      ──► line qty += n       │
//! │  Change quantity            ──► update_quantity ──► line qty = n        │
//! │  Remove                     ──► remove_item()   ──► line dropped        │
//! │  Checkout / clear           ──► clear()         ──► lines emptied       │
//! │                                                                         │
//! │  A line is keyed by (item id, size). Price is frozen when added.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ItemId, MenuItem, SizeTier};
use crate::validation::validate_quantity;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// A line in the cart.
///
/// Name, restaurant and price are frozen copies so the cart stays stable
/// when the catalog changes underneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartItem {
    pub item_id: ItemId,
    pub food_name: String,
    pub restaurant_name: String,
    pub size: SizeTier,
    pub unit_price: Money,
    pub quantity: i64,
    #[ts(as = "String")]
    pub added_at: DateTime<Utc>,
}

impl CartItem {
    /// Unit price × quantity.
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `(item_id, size)`
/// - Quantity is within 1..=999
/// - At most 100 lines
/// - Only published items (never pending ones)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    pub items: Vec<CartItem>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new()
    }
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            items: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Adds an item in the given size, or increases the existing line.
    pub fn add_item(&mut self, item: &MenuItem, size: SizeTier, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if item.is_pending || item.is_temporary() {
            return Err(CoreError::ItemNotOrderable(item.id.to_string()));
        }

        let unit_price = item
            .prices
            .get(size)
            .ok_or_else(|| CoreError::PriceUnavailable {
                food_name: item.food_name.clone(),
                size: size.to_string(),
            })?;

        if let Some(line) = self
            .items
            .iter_mut()
            .find(|l| l.item_id == item.id && l.size == size)
        {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        self.items.push(CartItem {
            item_id: item.id.clone(),
            food_name: item.food_name.clone(),
            restaurant_name: item.restaurant_name.clone(),
            size,
            unit_price,
            quantity,
            added_at: Utc::now(),
        });
        Ok(())
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, item_id: &ItemId, size: SizeTier, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(item_id, size);
        }
        validate_quantity(quantity)?;

        let line = self
            .items
            .iter_mut()
            .find(|l| &l.item_id == item_id && l.size == size)
            .ok_or_else(|| CoreError::NotInCart(format!("{} ({})", item_id, size)))?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove_item(&mut self, item_id: &ItemId, size: SizeTier) -> CoreResult<()> {
        let before = self.items.len();
        self.items
            .retain(|l| !(&l.item_id == item_id && l.size == size));

        if self.items.len() == before {
            Err(CoreError::NotInCart(format!("{} ({})", item_id, size)))
        } else {
            Ok(())
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.created_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|l| l.quantity).sum()
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

/// Cart totals summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartTotals {
    pub line_count: usize,
    pub total_quantity: i64,
    pub total: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            line_count: cart.items.len(),
            total_quantity: cart.total_quantity(),
            total: cart.total(),
        }
    }
}
