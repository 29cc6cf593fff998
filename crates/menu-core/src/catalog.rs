//! # Catalog Listing Logic
//!
//! Merging, filtering and ordering of menu items for display.
//!
//! ## Listing Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Catalog Pipeline                                 │
//! │                                                                         │
//! │  remote items (or samples)      pending items                           │
//! │          │                            │                                 │
//! │          └─────────────┬──────────────┘                                 │
//! │                        ▼                                                │
//! │  merge()   remote first, then pending                                   │
//! │            • duplicate ids dropped (first wins)                         │
//! │            • remote X hidden when a pending edit names X as originalId  │
//! │                        │                                                │
//! │                        ▼                                                │
//! │  filter()  category ("all" = any) AND case-insensitive search over      │
//! │            foodName / restaurantName / category                         │
//! │                        │                                                │
//! │                        ▼                                                │
//! │  sort()    stable; name / restaurant / category / cheapest price        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::MenuItem;

/// Category value meaning "no category filter".
pub const ALL_CATEGORIES: &str = "all";

// =============================================================================
// Sort Options
// =============================================================================

/// Field a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum SortField {
    #[serde(rename = "foodName")]
    Name,
    #[serde(rename = "restaurantName")]
    Restaurant,
    Category,
    Price,
}

impl FromStr for SortField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" | "foodname" => Ok(SortField::Name),
            "restaurant" | "restaurantname" => Ok(SortField::Restaurant),
            "category" => Ok(SortField::Category),
            "price" => Ok(SortField::Price),
            _ => Err(ValidationError::NotAllowed {
                field: "sortBy".to_string(),
                allowed: vec![
                    "name".into(),
                    "restaurant".into(),
                    "category".into(),
                    "price".into(),
                ],
            }),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortField::Name => "name",
            SortField::Restaurant => "restaurant",
            SortField::Category => "category",
            SortField::Price => "price",
        };
        f.write_str(s)
    }
}

/// Ordering direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SortDirection {
    #[default]
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl FromStr for SortDirection {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            _ => Err(ValidationError::NotAllowed {
                field: "sortOrder".to_string(),
                allowed: vec!["asc".into(), "desc".into()],
            }),
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// What the user asked to see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CatalogFilter {
    /// Free-text search; blank means no search.
    #[serde(default)]
    pub search: Option<String>,

    /// Exact category; `None` or `"all"` means any.
    #[serde(default)]
    pub category: Option<String>,

    /// `None` keeps merge order.
    #[serde(default)]
    pub sort_by: Option<SortField>,

    #[serde(default)]
    pub direction: SortDirection,
}

impl CatalogFilter {
    /// Returns true if the item passes both the category and search filters.
    pub fn matches(&self, item: &MenuItem) -> bool {
        matches_category(item, self.category.as_deref())
            && matches_search(item, self.search.as_deref())
    }

    /// Filters and sorts in one pass.
    pub fn apply(&self, items: &[MenuItem]) -> Vec<MenuItem> {
        let mut out: Vec<MenuItem> = items.iter().filter(|i| self.matches(i)).cloned().collect();
        if let Some(field) = self.sort_by {
            sort_items(&mut out, field, self.direction);
        }
        out
    }
}

/// Case-insensitive substring match over name, restaurant and category.
pub fn matches_search(item: &MenuItem, search: Option<&str>) -> bool {
    let needle = match search.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => return true,
    };

    [&item.food_name, &item.restaurant_name, &item.category]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Exact category match; `None` and `"all"` match everything.
pub fn matches_category(item: &MenuItem, category: Option<&str>) -> bool {
    match category {
        None => true,
        Some(c) if c.eq_ignore_ascii_case(ALL_CATEGORIES) => true,
        Some(c) => item.category == c,
    }
}

// =============================================================================
// Merge
// =============================================================================

/// Combines remote (or sample) items with the pending queue.
///
/// Remote items come first in their original order, then pending items in
/// queue order. A logical item is never shown twice.
pub fn merge(remote: Vec<MenuItem>, pending: Vec<MenuItem>) -> Vec<MenuItem> {
    let superseded: HashSet<_> = pending
        .iter()
        .filter_map(|p| p.original_id.clone())
        .collect();

    let mut seen = HashSet::new();
    let mut merged = Vec::with_capacity(remote.len() + pending.len());

    for item in remote {
        if superseded.contains(&item.id) {
            continue;
        }
        if seen.insert(item.id.clone()) {
            merged.push(item);
        }
    }
    for item in pending {
        if seen.insert(item.id.clone()) {
            merged.push(item);
        }
    }

    merged
}

// =============================================================================
// Sort
// =============================================================================

/// Stable in-place sort. Ties keep their merged order in both directions.
pub fn sort_items(items: &mut [MenuItem], field: SortField, direction: SortDirection) {
    items.sort_by(|a, b| {
        let ord = compare(a, b, field);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

fn compare(a: &MenuItem, b: &MenuItem, field: SortField) -> Ordering {
    match field {
        SortField::Name => cmp_text(&a.food_name, &b.food_name),
        SortField::Restaurant => cmp_text(&a.restaurant_name, &b.restaurant_name),
        SortField::Category => cmp_text(&a.category, &b.category),
        SortField::Price => a.sort_price().cmp(&b.sort_price()),
    }
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Distinct categories in first-appearance order.
pub fn categories(items: &[MenuItem]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|i| seen.insert(i.category.as_str()))
        .map(|i| i.category.clone())
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::{ItemId, Prices, SizeTier};

    fn item(id: &str, name: &str, restaurant: &str, category: &str, price: i64) -> MenuItem {
        MenuItem {
            id: ItemId::new(id),
            restaurant_id: String::new(),
            restaurant_name: restaurant.into(),
            food_name: name.into(),
            category: category.into(),
            prices: Prices::new().with(SizeTier::Medium, Money::from_cents(price)),
            image: None,
            created_at: None,
            updated_at: None,
            is_pending: false,
            original_id: None,
            last_error: None,
        }
    }

    fn ids(items: &[MenuItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_merge_remote_then_pending() {
        let remote = vec![item("r1", "A", "X", "Pizza", 100), item("r2", "B", "X", "Pizza", 100)];
        let mut p = item("temp_1_aaaaaaaaa", "C", "X", "Pasta", 100);
        p.is_pending = true;

        let merged = merge(remote, vec![p]);
        assert_eq!(ids(&merged), vec!["r1", "r2", "temp_1_aaaaaaaaa"]);
    }

    #[test]
    fn test_merge_hides_superseded_and_duplicates() {
        let remote = vec![item("r1", "A", "X", "Pizza", 100), item("r1", "A", "X", "Pizza", 100)];
        let mut edit = item("temp_1_aaaaaaaaa", "A2", "X", "Pizza", 100);
        edit.original_id = Some(ItemId::new("r1"));

        let merged = merge(remote, vec![edit.clone(), edit]);
        assert_eq!(ids(&merged), vec!["temp_1_aaaaaaaaa"]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let i = item("1", "Margherita Pizza", "Pizza Palace", "Pizza", 100);
        assert!(matches_search(&i, Some("margh")));
        assert!(matches_search(&i, Some("PALACE")));
        assert!(matches_search(&i, Some("  ")));
        assert!(matches_search(&i, None));
        assert!(!matches_search(&i, Some("burger")));
    }

    #[test]
    fn test_category_all_means_any() {
        let i = item("1", "A", "X", "Pizza", 100);
        assert!(matches_category(&i, Some("all")));
        assert!(matches_category(&i, None));
        assert!(matches_category(&i, Some("Pizza")));
        assert!(!matches_category(&i, Some("Pasta")));
    }

    #[test]
    fn test_filter_order_is_commutative() {
        let items = vec![
            item("1", "Margherita", "Pizza Palace", "Pizza", 100),
            item("2", "Pizza Burger", "Burger Joint", "Burger", 100),
            item("3", "Pepperoni", "Pizza Palace", "Pizza", 100),
        ];
        let by_cat_then_search: Vec<_> = items
            .iter()
            .filter(|i| matches_category(i, Some("Burger")))
            .filter(|i| matches_search(i, Some("pizza")))
            .collect();
        let by_search_then_cat: Vec<_> = items
            .iter()
            .filter(|i| matches_search(i, Some("pizza")))
            .filter(|i| matches_category(i, Some("Burger")))
            .collect();
        assert_eq!(by_cat_then_search, by_search_then_cat);
        assert_eq!(by_cat_then_search.len(), 1);
    }

    #[test]
    fn test_sort_by_name_ignores_case() {
        let mut items = vec![
            item("1", "banana", "X", "C", 1),
            item("2", "Apple", "X", "C", 1),
            item("3", "cherry", "X", "C", 1),
        ];
        sort_items(&mut items, SortField::Name, SortDirection::Ascending);
        assert_eq!(ids(&items), vec!["2", "1", "3"]);

        sort_items(&mut items, SortField::Name, SortDirection::Descending);
        assert_eq!(ids(&items), vec!["3", "1", "2"]);
    }

    #[test]
    fn test_sort_by_price_is_stable() {
        let mut items = vec![
            item("a", "A", "X", "C", 500),
            item("b", "B", "X", "C", 100),
            item("c", "C", "X", "C", 500),
        ];
        let mut free = item("d", "D", "X", "C", 0);
        free.prices = Prices::new();
        items.push(free);

        sort_items(&mut items, SortField::Price, SortDirection::Ascending);
        assert_eq!(ids(&items), vec!["d", "b", "a", "c"]);

        sort_items(&mut items, SortField::Price, SortDirection::Descending);
        assert_eq!(ids(&items), vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_filter_apply() {
        let items = vec![
            item("1", "Margherita", "Pizza Palace", "Pizza", 999),
            item("2", "Chicken Burger", "Burger Joint", "Burger", 799),
            item("3", "Pepperoni", "Pizza Palace", "Pizza", 1099),
        ];
        let filter = CatalogFilter {
            category: Some("Pizza".into()),
            sort_by: Some(SortField::Price),
            direction: SortDirection::Descending,
            ..Default::default()
        };
        assert_eq!(ids(&filter.apply(&items)), vec!["3", "1"]);
    }

    #[test]
    fn test_filter_without_sort_keeps_merge_order() {
        let items = vec![
            item("1", "Pepperoni", "Pizza Palace", "Pizza", 1099),
            item("2", "Chicken Burger", "Burger Joint", "Burger", 799),
            item("3", "Margherita", "Pizza Palace", "Pizza", 999),
        ];
        let filter = CatalogFilter::default();
        assert_eq!(ids(&filter.apply(&items)), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_categories_first_appearance() {
        let items = vec![
            item("1", "A", "X", "Pizza", 1),
            item("2", "B", "X", "Burger", 1),
            item("3", "C", "X", "Pizza", 1),
        ];
        assert_eq!(categories(&items), vec!["Pizza", "Burger"]);
    }

    #[test]
    fn test_sort_option_parsing() {
        assert_eq!("foodName".parse::<SortField>().unwrap(), SortField::Name);
        assert_eq!("price".parse::<SortField>().unwrap(), SortField::Price);
        assert!("rating".parse::<SortField>().is_err());
        assert_eq!(
            "desc".parse::<SortDirection>().unwrap(),
            SortDirection::Descending
        );
    }
}
