//! # Validation Module
//!
//! The trust boundary for menu item input.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  MenuItemDraft (raw strings from a form or the CLI)                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  validate_draft()  ← THIS MODULE                                       │
//! │  ├── trims every string once                                           │
//! │  ├── parses decimal prices into cents once                             │
//! │  ├── drops blank price tiers                                           │
//! │  └── collects EVERY failing field into a ValidationReport              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  ValidatedMenuItem (typed, safe to send or queue)                      │
//! │                                                                         │
//! │  Invalid drafts never reach the pending store or the network.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use menu_core::{validate_draft, MenuItemDraft, SizeTier};
//!
//! let draft = MenuItemDraft {
//!     restaurant_id: "64b7f0c2a1d3e4f5a6b7c8d9".into(),
//!     restaurant_name: "Pizza Palace".into(),
//!     food_name: "Margherita".into(),
//!     category: "Pizza".into(),
//!     ..Default::default()
//! }
//! .with_price(SizeTier::Small, "9.99");
//!
//! let item = validate_draft(&draft).unwrap();
//! assert_eq!(item.prices.get(SizeTier::Small).unwrap().cents(), 999);
//! ```

use chrono::{DateTime, Utc};

use crate::error::{ValidationError, ValidationReport};
use crate::money::Money;
use crate::types::{ImageRef, ItemId, MenuItem, MenuItemDraft, Prices, SizeTier};
use crate::{MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;
const MAX_CATEGORY_LEN: usize = 50;
const RESTAURANT_ID_LEN: usize = 24;

// =============================================================================
// Validated Item
// =============================================================================

/// A draft that passed validation. Fields are trimmed and typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMenuItem {
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub food_name: String,
    pub category: String,
    pub prices: Prices,
}

impl ValidatedMenuItem {
    /// Materializes the validated fields as a pending item.
    pub fn into_pending(
        self,
        id: ItemId,
        image: Option<ImageRef>,
        original_id: Option<ItemId>,
        now: DateTime<Utc>,
    ) -> MenuItem {
        MenuItem {
            id,
            restaurant_id: self.restaurant_id,
            restaurant_name: self.restaurant_name,
            food_name: self.food_name,
            category: self.category,
            prices: self.prices,
            image,
            created_at: Some(now),
            updated_at: Some(now),
            is_pending: true,
            original_id,
            last_error: None,
        }
    }

    /// Overwrites the editable fields of an existing item.
    pub fn apply_to(self, item: &mut MenuItem, now: DateTime<Utc>) {
        item.restaurant_id = self.restaurant_id;
        item.restaurant_name = self.restaurant_name;
        item.food_name = self.food_name;
        item.category = self.category;
        item.prices = self.prices;
        item.updated_at = Some(now);
    }
}

// =============================================================================
// Draft Validation
// =============================================================================

/// Validates a draft, reporting every failing field at once.
///
/// ## Rules
/// - `restaurantId`: required, 24 hexadecimal characters
/// - `restaurantName`, `foodName`: required, at most 200 characters
/// - `category`: required, at most 50 characters
/// - each non-blank price: a number, > 0 and ≤ 1000
/// - at least one valid price
pub fn validate_draft(draft: &MenuItemDraft) -> Result<ValidatedMenuItem, ValidationReport> {
    let mut report = ValidationReport::new();

    let restaurant_id = report.check(validate_restaurant_id(&draft.restaurant_id));
    let restaurant_name = report.check(validate_text(
        "restaurantName",
        &draft.restaurant_name,
        MAX_NAME_LEN,
    ));
    let food_name = report.check(validate_text("foodName", &draft.food_name, MAX_NAME_LEN));
    let category = report.check(validate_text("category", &draft.category, MAX_CATEGORY_LEN));

    let mut prices = Prices::new();
    let mut price_failed = false;
    for tier in SizeTier::ALL {
        let Some(raw) = draft.prices.get(&tier) else {
            continue;
        };
        match validate_price(tier, raw) {
            Ok(Some(price)) => prices.insert(tier, price),
            Ok(None) => {}
            Err(e) => {
                price_failed = true;
                report.push(e);
            }
        }
    }
    if prices.is_empty() && !price_failed {
        report.push(ValidationError::Required {
            field: "prices".to_string(),
        });
    }

    match (restaurant_id, restaurant_name, food_name, category) {
        (Some(restaurant_id), Some(restaurant_name), Some(food_name), Some(category))
            if report.is_empty() =>
        {
            Ok(ValidatedMenuItem {
                restaurant_id,
                restaurant_name,
                food_name,
                category,
                prices,
            })
        }
        _ => Err(report),
    }
}

// =============================================================================
// Field Validators
// =============================================================================

/// Validates the owning restaurant's id (24 hex characters).
pub fn validate_restaurant_id(id: &str) -> ValidationResult<String> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "restaurantId".to_string(),
        });
    }

    if id.len() != RESTAURANT_ID_LEN || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidFormat {
            field: "restaurantId".to_string(),
            reason: "must be 24 hexadecimal characters".to_string(),
        });
    }

    Ok(id.to_string())
}

/// Validates a required free-text field and returns it trimmed.
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates one price entry.
///
/// Blank input means the size is not offered and yields `Ok(None)`.
pub fn validate_price(tier: SizeTier, raw: &str) -> ValidationResult<Option<Money>> {
    let field = format!("prices.{}", tier);
    let raw = raw.trim();

    if raw.is_empty() {
        return Ok(None);
    }

    let amount = match raw.parse::<f64>() {
        Ok(a) if a.is_finite() => a,
        _ => return Err(not_a_number(field)),
    };

    if amount <= 0.0 {
        return Err(ValidationError::MustBePositive { field });
    }

    // Bounds apply to the amount as typed, before rounding to cents.
    let max = Money::from_cents(MAX_PRICE_CENTS).to_decimal();
    if amount < 0.01 || amount > max {
        return Err(ValidationError::OutOfRange {
            field,
            min: "0.01".to_string(),
            max: max.to_string(),
        });
    }

    match Money::from_decimal(amount) {
        Some(price) => Ok(Some(price)),
        None => Err(not_a_number(field)),
    }
}

fn not_a_number(field: String) -> ValidationError {
    ValidationError::InvalidFormat {
        field,
        reason: "must be a number".to_string(),
    }
}

/// Validates an identifier passed to edit or delete.
///
/// Identifiers end up in URL paths, so whitespace and `/` are rejected.
pub fn validate_item_id(id: &str) -> ValidationResult<ItemId> {
    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    if id.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ValidationError::InvalidFormat {
            field: "id".to_string(),
            reason: "must not contain whitespace or '/'".to_string(),
        });
    }

    Ok(ItemId::new(id))
}

/// Validates a cart quantity (1..=999).
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: "1".to_string(),
            max: MAX_ITEM_QUANTITY.to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_draft() -> MenuItemDraft {
        MenuItemDraft {
            restaurant_id: "64b7f0c2a1d3e4f5a6b7c8d9".into(),
            restaurant_name: "  Pizza Palace ".into(),
            food_name: "Margherita".into(),
            category: "Pizza".into(),
            ..Default::default()
        }
        .with_price(SizeTier::Small, "9.99")
        .with_price(SizeTier::Medium, "")
    }

    #[test]
    fn test_valid_draft_is_normalized() {
        let item = validate_draft(&valid_draft()).unwrap();
        assert_eq!(item.restaurant_name, "Pizza Palace");
        assert_eq!(item.prices.len(), 1);
        assert_eq!(item.prices.get(SizeTier::Small), Some(Money::from_cents(999)));
        assert_eq!(item.prices.get(SizeTier::Medium), None);
    }

    #[test]
    fn test_restaurant_id_rules() {
        assert!(validate_restaurant_id("64b7f0c2a1d3e4f5a6b7c8d9").is_ok());
        assert!(validate_restaurant_id("64B7F0C2A1D3E4F5A6B7C8D9").is_ok());
        assert!(matches!(
            validate_restaurant_id(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_restaurant_id("64b7f0c2a1d3e4f5a6b7c8dz"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(validate_restaurant_id("abc").is_err());
    }

    #[test]
    fn test_price_rules() {
        assert_eq!(validate_price(SizeTier::Small, " "), Ok(None));
        assert_eq!(
            validate_price(SizeTier::Small, "1000"),
            Ok(Some(Money::from_cents(100_000)))
        );
        assert!(matches!(
            validate_price(SizeTier::Small, "0"),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_price(SizeTier::Small, "-3"),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_price(SizeTier::Large, "1000.01"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            validate_price(SizeTier::Large, "cheap"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_price_bounds_checked_before_rounding() {
        assert!(matches!(
            validate_price(SizeTier::Small, "1000.004"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            validate_price(SizeTier::Small, "0.004"),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(
            validate_price(SizeTier::Small, "0.01"),
            Ok(Some(Money::from_cents(1)))
        );
        assert_eq!(
            validate_price(SizeTier::Small, "12.99"),
            Ok(Some(Money::from_cents(1299)))
        );
    }

    #[test]
    fn test_report_lists_every_failure() {
        let draft = MenuItemDraft {
            restaurant_id: "nope".into(),
            category: "  ".into(),
            ..Default::default()
        }
        .with_price(SizeTier::Large, "abc");

        let report = validate_draft(&draft).unwrap_err();
        assert!(report.has_field("restaurantId"));
        assert!(report.has_field("restaurantName"));
        assert!(report.has_field("foodName"));
        assert!(report.has_field("category"));
        assert!(report.has_field("prices.large"));
        // A bad price already explains the missing price
        assert!(!report.has_field("prices"));
    }

    #[test]
    fn test_at_least_one_price_required() {
        let mut draft = valid_draft();
        draft.prices.clear();
        let report = validate_draft(&draft).unwrap_err();
        assert_eq!(report.len(), 1);
        assert!(report.has_field("prices"));
    }

    #[test]
    fn test_text_length_limits() {
        let mut draft = valid_draft();
        draft.category = "c".repeat(51);
        let report = validate_draft(&draft).unwrap_err();
        assert!(matches!(
            report.errors()[0],
            ValidationError::TooLong { max: 50, .. }
        ));
    }

    #[test]
    fn test_item_id_rules() {
        assert!(validate_item_id("temp_1_abc").is_ok());
        assert!(validate_item_id("").is_err());
        assert!(validate_item_id("a/b").is_err());
        assert!(validate_item_id("a b").is_err());
    }

    #[test]
    fn test_quantity_rules() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_into_pending() {
        let id = ItemId::temporary();
        let now = Utc::now();
        let item = validate_draft(&valid_draft())
            .unwrap()
            .into_pending(id.clone(), None, None, now);
        assert_eq!(item.id, id);
        assert!(item.is_pending);
        assert_eq!(item.created_at, Some(now));
    }
}
