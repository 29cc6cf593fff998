//! # Domain Types
//!
//! Core domain types shared by every layer of the menu client.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    MenuItem     │   │     ItemId      │   │    ImageRef     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  server id      │   │  Url            │       │
//! │  │  foodName       │   │  or temp_…      │   │  Path           │       │
//! │  │  prices         │   └─────────────────┘   │  Embedded       │       │
//! │  │  imageUrl       │                         └─────────────────┘       │
//! │  │  isPending      │   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  originalId     │   │    SizeTier     │   │     Prices      │       │
//! │  └─────────────────┘   │  small          │   │  tier → Money   │       │
//! │                        │  medium / large │   │  (cents)        │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Shape
//! The catalog service stores documents with `_id` and decimal prices. The
//! serde attributes below keep that shape, so a `MenuItem` can be written to
//! local storage and read back by the web client unchanged:
//! ```json
//! {
//!   "_id": "temp_1718000000000_k3j9x0a2b",
//!   "restaurantId": "64b7f0c2a1d3e4f5a6b7c8d9",
//!   "restaurantName": "Pizza Palace",
//!   "foodName": "Margherita",
//!   "category": "Pizza",
//!   "prices": { "small": 9.99, "large": 15.99 },
//!   "imageUrl": "data:image/jpeg;base64,...",
//!   "isPending": true
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::money::Money;
use crate::TEMP_ID_PREFIX;

// =============================================================================
// Item Identifier
// =============================================================================

/// Identifier of a menu item.
///
/// Either opaque and server-assigned, or generated locally with the
/// `temp_` prefix. A temporary id never reaches the server: replay creates
/// a fresh server record and the temporary id is retired.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        ItemId(id.into())
    }

    /// Generates a fresh temporary identifier:
    /// `temp_<unix millis>_<9 lowercase alphanumerics>`.
    pub fn temporary() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        ItemId(format!(
            "{}{}_{}",
            TEMP_ID_PREFIX,
            Utc::now().timestamp_millis(),
            &suffix[..9]
        ))
    }

    /// Returns true for locally generated identifiers.
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

// =============================================================================
// Size Tier
// =============================================================================

/// Portion size a price applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SizeTier {
    Small,
    Medium,
    Large,
}

impl SizeTier {
    /// All tiers in display order.
    pub const ALL: [SizeTier; 3] = [SizeTier::Small, SizeTier::Medium, SizeTier::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeTier::Small => "small",
            SizeTier::Medium => "medium",
            SizeTier::Large => "large",
        }
    }
}

impl fmt::Display for SizeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeTier {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "small" | "s" => Ok(SizeTier::Small),
            "medium" | "m" => Ok(SizeTier::Medium),
            "large" | "l" => Ok(SizeTier::Large),
            _ => Err(ValidationError::NotAllowed {
                field: "size".to_string(),
                allowed: SizeTier::ALL.iter().map(|t| t.to_string()).collect(),
            }),
        }
    }
}

// =============================================================================
// Prices
// =============================================================================

/// Price per size tier, held in cents.
///
/// Serialized as decimal numbers (`{"small": 9.99}`). Deserialization is
/// lenient with remote data: unknown tiers, nulls and unparseable values are
/// skipped, and numeric strings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prices(BTreeMap<SizeTier, Money>);

impl Prices {
    pub fn new() -> Self {
        Prices(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, tier: SizeTier, price: Money) -> Self {
        self.0.insert(tier, price);
        self
    }

    pub fn insert(&mut self, tier: SizeTier, price: Money) {
        self.0.insert(tier, price);
    }

    pub fn get(&self, tier: SizeTier) -> Option<Money> {
        self.0.get(&tier).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SizeTier, Money)> + '_ {
        self.0.iter().map(|(t, m)| (*t, *m))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Lowest defined price, if any.
    pub fn min(&self) -> Option<Money> {
        self.0.values().copied().min()
    }
}

impl Serialize for Prices {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (tier, price) in &self.0 {
            map.serialize_entry(tier, &price.to_decimal())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Prices {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawPrice {
            Number(f64),
            Text(String),
        }

        let raw: BTreeMap<String, Option<RawPrice>> = BTreeMap::deserialize(deserializer)?;
        let mut prices = Prices::new();
        for (key, value) in raw {
            let Ok(tier) = key.parse::<SizeTier>() else {
                continue;
            };
            let parsed = match value {
                Some(RawPrice::Number(n)) => Money::from_decimal(n),
                Some(RawPrice::Text(t)) => Money::parse_decimal(&t),
                None => None,
            };
            if let Some(price) = parsed {
                prices.insert(tier, price);
            }
        }
        Ok(prices)
    }
}

// =============================================================================
// Image Reference
// =============================================================================

/// Where an item's picture lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Absolute `http(s)://` URL.
    Url(String),

    /// Path relative to the catalog service (e.g. `/uploads/abc.jpg`).
    Path(String),

    /// `data:<mime>;base64,<payload>` image carried by a pending item.
    Embedded(String),
}

impl ImageRef {
    /// Classifies a stored string. Blank strings mean "no image".
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            None
        } else if raw.starts_with("data:") {
            Some(ImageRef::Embedded(raw.to_string()))
        } else if raw.starts_with("http://") || raw.starts_with("https://") {
            Some(ImageRef::Url(raw.to_string()))
        } else {
            Some(ImageRef::Path(raw.to_string()))
        }
    }

    /// Builds an embedded reference from an already base64-encoded payload.
    pub fn embedded(mime: &str, base64_payload: &str) -> Self {
        ImageRef::Embedded(format!("data:{};base64,{}", mime, base64_payload))
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageRef::Url(s) | ImageRef::Path(s) | ImageRef::Embedded(s) => s,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, ImageRef::Embedded(_))
    }

    /// MIME type of an embedded image.
    pub fn embedded_mime(&self) -> Option<&str> {
        match self {
            ImageRef::Embedded(s) => s
                .strip_prefix("data:")
                .and_then(|rest| rest.split_once(";base64,"))
                .map(|(mime, _)| mime),
            _ => None,
        }
    }

    /// Base64 payload of an embedded image.
    pub fn embedded_payload(&self) -> Option<&str> {
        match self {
            ImageRef::Embedded(s) => s.split_once(";base64,").map(|(_, data)| data),
            _ => None,
        }
    }

    /// Absolute location for display. Relative paths are joined to `base_url`.
    pub fn resolve(&self, base_url: &str) -> String {
        match self {
            ImageRef::Path(p) => format!(
                "{}/{}",
                base_url.trim_end_matches('/'),
                p.trim_start_matches('/')
            ),
            other => other.as_str().to_string(),
        }
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

fn deserialize_image<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ImageRef>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.as_deref().and_then(ImageRef::parse))
}

// =============================================================================
// Menu Item
// =============================================================================

/// A dish offered by a restaurant, either published or pending locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MenuItem {
    #[serde(rename = "_id")]
    pub id: ItemId,

    /// 24-hex-character owner id. Empty on built-in sample items.
    #[serde(default)]
    pub restaurant_id: String,

    pub restaurant_name: String,

    pub food_name: String,

    pub category: String,

    #[serde(default)]
    #[ts(as = "BTreeMap<SizeTier, f64>")]
    pub prices: Prices,

    #[serde(
        rename = "imageUrl",
        default,
        deserialize_with = "deserialize_image",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(as = "Option<String>")]
    pub image: Option<ImageRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub updated_at: Option<DateTime<Utc>>,

    /// True only while the item exists solely in the pending store.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_pending: bool,

    /// Server id this pending item is an edit of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_id: Option<ItemId>,

    /// Failure detail of the last unsuccessful replay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl MenuItem {
    pub fn is_temporary(&self) -> bool {
        self.id.is_temporary()
    }

    /// Price used for sorting: the cheapest size, or zero.
    pub fn sort_price(&self) -> Money {
        self.prices.min().unwrap_or_else(Money::zero)
    }

    pub fn has_embedded_image(&self) -> bool {
        self.image.as_ref().is_some_and(ImageRef::is_embedded)
    }

    /// Drops an embedded image. Returns true if one was removed.
    pub fn strip_embedded_image(&mut self) -> bool {
        if self.has_embedded_image() {
            self.image = None;
            true
        } else {
            false
        }
    }
}

// =============================================================================
// Menu Item Draft
// =============================================================================

/// Raw form input for creating or editing an item.
///
/// Nothing here is trusted; see [`crate::validation::validate_draft`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MenuItemDraft {
    pub restaurant_id: String,
    pub restaurant_name: String,
    pub food_name: String,
    pub category: String,
    /// Raw price text per tier; blank entries mean "not offered".
    #[serde(default)]
    pub prices: BTreeMap<SizeTier, String>,
}

impl MenuItemDraft {
    /// Pre-fills an edit form from an existing item.
    pub fn from_item(item: &MenuItem) -> Self {
        MenuItemDraft {
            restaurant_id: item.restaurant_id.clone(),
            restaurant_name: item.restaurant_name.clone(),
            food_name: item.food_name.clone(),
            category: item.category.clone(),
            prices: item
                .prices
                .iter()
                .map(|(tier, price)| (tier, format!("{:.2}", price.to_decimal())))
                .collect(),
        }
    }

    /// Builder-style price setter.
    pub fn with_price(mut self, tier: SizeTier, raw: impl Into<String>) -> Self {
        self.prices.insert(tier, raw.into());
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
