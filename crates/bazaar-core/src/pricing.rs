//! # Pricing Calculator
//!
//! Derives every total on a cart from its lines, the shop settings and the
//! attached coupon.
//!
//! ## Calculation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lines empty?                                                           │
//! │    └── yes → tax = shipping = total = 0, coupon cleared                 │
//! │                                                                         │
//! │  line_total_i = price_i × quantity_i                                    │
//! │  subtotal     = Σ line_total_i                                          │
//! │  total        = subtotal + tax + shipping                               │
//! │  discounted   = total − round_half_away(total × bps / 10000)            │
//! │                 (only while a coupon is attached)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals stored with a cart are cached snapshots. Call [`recompute_totals`]
//! after every mutation and before every read.

use crate::cart::Cart;
use crate::money::Money;
use crate::types::AppSettings;

/// Recomputes line totals, cart totals and the coupon discount in place.
pub fn recompute_totals(cart: &mut Cart, settings: &AppSettings) {
    if cart.items.is_empty() {
        cart.tax_price = Money::zero();
        cart.shipping_price = Money::zero();
        cart.total_price = Money::zero();
        cart.coupon = None;
        cart.total_price_after_discount = None;
        return;
    }

    for item in &mut cart.items {
        item.refresh_line_total();
    }

    cart.tax_price = settings.tax_price;
    cart.shipping_price = settings.shipping_price;
    cart.total_price = subtotal(cart) + settings.tax_price + settings.shipping_price;
    cart.total_price_after_discount = cart
        .coupon
        .as_ref()
        .map(|coupon| cart.total_price.apply_percentage_discount(coupon.discount));
}

/// Sum of the line totals.
pub fn subtotal(cart: &Cart) -> Money {
    cart.items.iter().map(|i| i.line_total).sum()
}

// =============================================================================
// Unit Tests
// =============================================================================
