//! Built-in catalog shown when the catalog service cannot be reached.

use crate::money::Money;
use crate::types::{ItemId, MenuItem, Prices, SizeTier};

fn sample(id: &str, food: &str, restaurant: &str, category: &str, cents: [i64; 3]) -> MenuItem {
    let prices = SizeTier::ALL
        .iter()
        .zip(cents)
        .fold(Prices::new(), |p, (tier, c)| p.with(*tier, Money::from_cents(c)));

    MenuItem {
        id: ItemId::new(id),
        restaurant_id: String::new(),
        restaurant_name: restaurant.to_string(),
        food_name: food.to_string(),
        category: category.to_string(),
        prices,
        image: None,
        created_at: None,
        updated_at: None,
        is_pending: false,
        original_id: None,
        last_error: None,
    }
}

/// The fallback sample set, in display order.
pub fn sample_items() -> Vec<MenuItem> {
    vec![
        sample("mock1", "Margherita Pizza", "Pizza Palace", "Pizza", [999, 1299, 1599]),
        sample("mock2", "Chicken Burger", "Burger Joint", "Burger", [799, 1099, 1399]),
        sample("mock3", "Vegetable Pasta", "Italian Bistro", "Pasta", [899, 1199, 1499]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_items() {
        let items = sample_items();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id.as_str(), "mock1");
        assert_eq!(items[1].prices.get(SizeTier::Large), Some(Money::from_cents(1399)));
        assert!(items.iter().all(|i| !i.is_pending && !i.is_temporary()));
    }
}
