//! # bazaar-core: Pure Business Logic for Bazaar
//!
//! This crate holds the shopping-cart pricing and reconciliation engine as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    HTTP host (routing, auth)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-service                               │   │
//! │  │    get_cart, add_item, apply_coupon, create_cash_order, ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌───────────┐ ┌─────────┐ ┌───────┐ │   │
//! │  │   │  types   │ │   cart   │ │ reconcile │ │ pricing │ │ order │ │   │
//! │  │   │ Product  │ │ CartItem │ │   drift   │ │ totals  │ │ Order │ │   │
//! │  │   └──────────┘ └──────────┘ └───────────┘ └─────────┘ └───────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  │          SQLite queries, migrations, checkout transaction       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product variant model, settings, addresses
//! - [`money`] - Money type with integer arithmetic
//! - [`cart`] - Cart, cart lines and the add/update stock rules
//! - [`reconcile`] - Re-validating cart lines against live products
//! - [`pricing`] - Cart totals, tax, shipping and coupon discount
//! - [`coupon`] - Coupon model and apply rules
//! - [`order`] - Order snapshot and status flags
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::{AppSettings, Cart, Money, Product, ProductPricing, RepeatAddPolicy};
//! use bazaar_core::pricing::recompute_totals;
//!
//! let shirt = Product::new("Shirt", None, ProductPricing::flat(Money::from_cents(1000), 10)).unwrap();
//!
//! let mut cart = Cart::new("user-1");
//! cart.upsert_item(&shirt, 2, None, RepeatAddPolicy::Replace).unwrap();
//!
//! let settings = AppSettings {
//!     tax_price: Money::from_cents(150),
//!     shipping_price: Money::from_cents(500),
//! };
//! recompute_totals(&mut cart, &settings);
//!
//! assert_eq!(cart.total_price.cents(), 2000 + 150 + 500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod coupon;
pub mod error;
pub mod money;
pub mod order;
pub mod pricing;
pub mod reconcile;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{AppliedCoupon, Cart, CartItem, RepeatAddPolicy};
pub use coupon::Coupon;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order::{Order, StockMovement};
pub use reconcile::{ProductIndex, ReconcileReport};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart line.
///
/// ## Business Reason
/// Catches typos (1000 instead of 10) before they reach the stock check.
pub const MAX_ITEM_QUANTITY: i64 = 999;
