//! # menu-core: Pure Domain Logic for the Menu Catalog
//!
//! Everything in this crate is deterministic and free of I/O. Storage and
//! network concerns live in `menu-store` and `menu-sync`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Menu Admin Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  apps/menu-admin (CLI)                          │   │
//! │  │    list ──► create ──► edit ──► delete ──► replay ──► order     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        menu-sync (prober, reconciler, catalog view)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ menu-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  catalog  │  │ validation│  │   │
//! │  │   │ MenuItem  │  │   Money   │  │ merge     │  │ drafts    │  │   │
//! │  │   │ ItemId    │  │   cents   │  │ filter    │  │ reports   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO STORAGE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - MenuItem, ItemId, SizeTier, Prices, ImageRef
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Draft validation at the trust boundary
//! - [`catalog`] - Merge, filter and sort of catalog listings
//! - [`samples`] - Built-in items shown when the service is unreachable
//! - [`cart`] - Customer cart
//!
//! ## Example Usage
//!
//! ```rust
//! use menu_core::money::Money;
//!
//! let price = Money::parse_decimal("12.99").unwrap();
//! assert_eq!(price.cents(), 1299);
//! assert_eq!(price.to_string(), "$12.99");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod error;
pub mod money;
pub mod samples;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem, CartTotals};
pub use catalog::{CatalogFilter, SortDirection, SortField};
pub use error::{CoreError, CoreResult, ValidationError, ValidationReport};
pub use money::Money;
pub use types::*;
pub use validation::{validate_draft, ValidatedMenuItem};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Prefix reserved for identifiers generated on this device.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Upper bound for a single size price (in cents).
pub const MAX_PRICE_CENTS: i64 = 100_000;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in the cart.
///
/// Guards against typing 1000 instead of 10.
pub const MAX_ITEM_QUANTITY: i64 = 999;
