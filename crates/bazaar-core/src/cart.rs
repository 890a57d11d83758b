//! # Cart
//!
//! The persisted shopping cart and the stock rules for putting lines in it.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Shopper Action        Service Operation        Cart Change             │
//! │  ──────────────        ─────────────────        ───────────             │
//! │                                                                         │
//! │  Add to cart ─────────► add_item() ───────────► upsert_item()           │
//! │                                                                         │
//! │  Change quantity ─────► update_item_quantity() ► set_item_quantity()    │
//! │                                                                         │
//! │  Remove line ─────────► remove_item() ────────► remove_item()           │
//! │                                                                         │
//! │  Every call ──────────► reconcile() → recompute_totals() → save (CAS)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `(product_id, size)`
//! - `size` is present exactly when the product is sized
//! - `quantity >= 1`
//! - Totals and coupon fields are derived by [`crate::pricing`] and are
//!   never trusted across requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{normalize_size, DiscountRate, Product, ProductPricing};
use crate::validation::{validate_cart_size, validate_quantity, validate_size};

// =============================================================================
// Repeat-Add Policy
// =============================================================================

/// What adding an already-present `(product, size)` does to its quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RepeatAddPolicy {
    /// The requested quantity replaces the stored one.
    #[default]
    Replace,
    /// The requested quantity is added to the stored one.
    Increment,
}

// =============================================================================
// Cart Item
// =============================================================================

/// One line of a cart (and, once checked out, of an order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    /// Line id (UUID v4), stable across quantity updates.
    pub id: String,

    pub product_id: String,

    pub quantity: i64,

    /// Uppercased size label, for sized products only.
    pub size: Option<String>,

    /// Product colour captured at add time, refreshed by reconciliation.
    pub color: Option<String>,

    /// Unit price captured at add time, refreshed by reconciliation.
    pub price: Money,

    /// `price × quantity`, derived by pricing.
    pub line_total: Money,
}

impl CartItem {
    /// Recomputes `line_total` from price and quantity.
    #[inline]
    pub fn refresh_line_total(&mut self) {
        self.line_total = self.price.multiply_quantity(self.quantity);
    }

    fn is_same_line(&self, product_id: &str, size: Option<&str>) -> bool {
        self.product_id == product_id && self.size.as_deref() == size
    }
}

/// A coupon attached to a cart or order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedCoupon {
    /// The (uppercased) coupon code.
    pub name: String,
    pub discount: DiscountRate,
}

// =============================================================================
// Resolved Line
// =============================================================================

/// Result of checking a requested `(product, quantity, size)` against stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub size: Option<String>,
    pub unit_price: Money,
    pub color: Option<String>,
}

/// Checks a product can supply `quantity` units of `size`.
///
/// ## Rules
/// ```text
/// Flat product                         Sized product
/// ────────────                         ─────────────
/// size given?      → SizeNotSupported  size missing?    → SizeRequired
/// stock <= 0?      → OutOfStock        no such size?    → SizeNotFound
/// qty > stock?     → InsufficientStock variant stock 0? → OutOfStock
/// price = sale ?? list                 qty > stock?     → InsufficientStock
///                                      price = variant sale ?? list
/// ```
pub fn resolve_line(product: &Product, quantity: i64, size: Option<&str>) -> CoreResult<ResolvedLine> {
    validate_quantity(quantity)?;

    match &product.pricing {
        ProductPricing::Flat {
            price,
            quantity: stock,
            price_after_discount,
        } => {
            if size.is_some() {
                return Err(CoreError::SizeNotSupported {
                    product_id: product.id.clone(),
                });
            }
            check_stock(&product.id, None, *stock, quantity)?;

            Ok(ResolvedLine {
                size: None,
                unit_price: price_after_discount.unwrap_or(*price),
                color: product.color.clone(),
            })
        }
        ProductPricing::Sized { .. } => {
            let size = match size {
                Some(size) if !size.trim().is_empty() => size,
                _ => {
                    return Err(CoreError::SizeRequired {
                        product_id: product.id.clone(),
                    })
                }
            };
            validate_size(size)?;
            let size = normalize_size(size);

            let variant = product
                .pricing
                .find_variant(&size)
                .ok_or_else(|| CoreError::SizeNotFound {
                    product_id: product.id.clone(),
                    size: size.clone(),
                })?;
            check_stock(&product.id, Some(&size), variant.quantity, quantity)?;

            Ok(ResolvedLine {
                unit_price: variant.unit_price(),
                size: Some(size),
                color: product.color.clone(),
            })
        }
    }
}

fn check_stock(product_id: &str, size: Option<&str>, available: i64, requested: i64) -> CoreResult<()> {
    if available <= 0 {
        return Err(CoreError::OutOfStock {
            product_id: product_id.to_string(),
            size: size.map(str::to_string),
        });
    }
    if requested > available {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            size: size.map(str::to_string),
            available,
            requested,
        });
    }
    Ok(())
}

// =============================================================================
// Cart
// =============================================================================

/// A shopper's cart. One per user, created lazily on first add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub id: String,

    /// Owning user; unique across carts.
    pub user_id: String,

    pub items: Vec<CartItem>,

    pub tax_price: Money,
    pub shipping_price: Money,
    pub total_price: Money,

    pub coupon: Option<AppliedCoupon>,
    pub total_price_after_discount: Option<Money>,

    /// Optimistic-concurrency version; 0 until first saved.
    pub version: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new, unsaved, empty cart for `user_id`.
    pub fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Cart {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            items: Vec::new(),
            tax_price: Money::zero(),
            shipping_price: Money::zero(),
            total_price: Money::zero(),
            coupon: None,
            total_price_after_discount: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// True until the cart has been written once.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.version == 0
    }

    /// Number of lines in the cart.
    #[inline]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find_item(&self, item_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    /// What the shopper pays: the discounted total when a coupon applies.
    pub fn amount_due(&self) -> Money {
        self.total_price_after_discount.unwrap_or(self.total_price)
    }

    /// Adds `product` to the cart, or changes the quantity of the existing
    /// `(product, size)` line according to `policy`.
    ///
    /// Stock is checked against the quantity the line ends up with. The
    /// cart must already be reconciled so an existing line carries the
    /// current price.
    pub fn upsert_item(
        &mut self,
        product: &Product,
        quantity: i64,
        size: Option<&str>,
        policy: RepeatAddPolicy,
    ) -> CoreResult<&CartItem> {
        validate_quantity(quantity)?;
        let normalized = size.map(normalize_size);

        let existing = self
            .items
            .iter()
            .position(|i| i.is_same_line(&product.id, normalized.as_deref()));

        match existing {
            Some(idx) => {
                let target = match policy {
                    RepeatAddPolicy::Replace => quantity,
                    RepeatAddPolicy::Increment => self.items[idx].quantity + quantity,
                };
                resolve_line(product, target, normalized.as_deref())?;

                let item = &mut self.items[idx];
                item.quantity = target;
                item.refresh_line_total();
                Ok(&self.items[idx])
            }
            None => {
                validate_cart_size(self.items.len())?;
                let line = resolve_line(product, quantity, normalized.as_deref())?;

                self.items.push(CartItem {
                    id: uuid::Uuid::new_v4().to_string(),
                    product_id: product.id.clone(),
                    quantity,
                    size: line.size,
                    color: line.color,
                    price: line.unit_price,
                    line_total: line.unit_price.multiply_quantity(quantity),
                });
                let idx = self.items.len() - 1;
                Ok(&self.items[idx])
            }
        }
    }

    /// Sets the quantity of line `item_id`, re-checking stock against the
    /// line's own product and size.
    pub fn set_item_quantity(
        &mut self,
        item_id: &str,
        product: &Product,
        quantity: i64,
    ) -> CoreResult<&CartItem> {
        let idx = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CoreError::CartItemNotFound(item_id.to_string()))?;

        resolve_line(product, quantity, self.items[idx].size.as_deref())?;

        let item = &mut self.items[idx];
        item.quantity = quantity;
        item.refresh_line_total();
        Ok(&self.items[idx])
    }

    /// Removes line `item_id` and returns it.
    pub fn remove_item(&mut self, item_id: &str) -> CoreResult<CartItem> {
        let idx = self
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| CoreError::CartItemNotFound(item_id.to_string()))?;
        Ok(self.items.remove(idx))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
