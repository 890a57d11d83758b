//! # Orders
//!
//! The immutable snapshot a cart becomes at checkout, and its two
//! administrative status flags.
//!
//! ## Checkout State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Fetching ──► Validating ──┬──► Aborted (StaleCart, cart corrected)    │
//! │                            │                                            │
//! │                            └──► Committing ──► Done (Order returned)   │
//! │                                     │                                   │
//! │                                     ├── insert order                    │
//! │                                     ├── decrement stock, bump sold      │
//! │                                     └── delete cart                     │
//! │                                     (one transaction, bazaar-db)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Flags
//! `is_paid`/`paid_at` and `is_delivered`/`delivered_at` are independent
//! admin overrides. Setting a flag stamps its timestamp; clearing it clears
//! the timestamp. There is no forward-only ordering between them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{AppliedCoupon, Cart, CartItem};
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentMethodType, ShippingAddress};
use crate::validation::validate_shipping_address;

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub user_id: String,

    /// Lines copied from the cart. Never re-synced with the catalog.
    pub items: Vec<CartItem>,
    pub shipping_address: ShippingAddress,

    pub tax_price: Money,
    pub shipping_price: Money,
    pub total_price: Money,
    pub coupon: Option<AppliedCoupon>,
    pub total_price_after_discount: Option<Money>,

    pub payment_method: PaymentMethodType,

    /// Payment provider session id for card orders; unique across orders.
    pub payment_reference: Option<String>,

    pub is_paid: bool,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,

    pub is_delivered: bool,
    #[ts(as = "Option<String>")]
    pub delivered_at: Option<DateTime<Utc>>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Snapshots a reconciled, priced cart into a new unpaid order.
    ///
    /// ## When This Fails
    /// - `EmptyOrder` if the cart has no lines
    /// - `Validation` if the shipping address is malformed
    pub fn from_cart(
        cart: &Cart,
        shipping_address: ShippingAddress,
        payment_method: PaymentMethodType,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if cart.is_empty() {
            return Err(CoreError::EmptyOrder);
        }
        validate_shipping_address(&shipping_address)?;

        Ok(Order {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: cart.user_id.clone(),
            items: cart.items.clone(),
            shipping_address,
            tax_price: cart.tax_price,
            shipping_price: cart.shipping_price,
            total_price: cart.total_price,
            coupon: cart.coupon.clone(),
            total_price_after_discount: cart.total_price_after_discount,
            payment_method,
            payment_reference: None,
            is_paid: false,
            paid_at: None,
            is_delivered: false,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Marks the order as paid by card through provider session `reference`.
    pub fn paid_by_card(mut self, reference: &str, now: DateTime<Utc>) -> Self {
        self.payment_method = PaymentMethodType::Card;
        self.payment_reference = Some(reference.to_string());
        self.set_paid(true, now);
        self
    }

    /// Sets or clears the paid flag, stamping or clearing `paid_at`.
    pub fn set_paid(&mut self, paid: bool, now: DateTime<Utc>) {
        self.is_paid = paid;
        self.paid_at = paid.then_some(now);
        self.updated_at = now;
    }

    /// Sets or clears the delivered flag, stamping or clearing `delivered_at`.
    pub fn set_delivered(&mut self, delivered: bool, now: DateTime<Utc>) {
        self.is_delivered = delivered;
        self.delivered_at = delivered.then_some(now);
        self.updated_at = now;
    }

    /// The amount charged: discounted total when a coupon was applied.
    pub fn amount_due(&self) -> Money {
        self.total_price_after_discount.unwrap_or(self.total_price)
    }

    /// Inventory changes this order commits, one per line.
    pub fn stock_movements(&self) -> Vec<StockMovement> {
        self.items
            .iter()
            .map(|item| StockMovement {
                product_id: item.product_id.clone(),
                size: item.size.clone(),
                quantity: item.quantity,
            })
            .collect()
    }
}

/// Units leaving stock for one product (and size) at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub product_id: String,
    pub size: Option<String>,
    pub quantity: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
