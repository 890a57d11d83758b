//! # Coupons
//!
//! Percentage-off coupons and the rule for attaching one to a cart.
//!
//! ## Apply Flow
//! ```text
//! code ──► normalize (trim, uppercase) ──► lookup where expire > now
//!                                               │
//!                      none ◄───────────────────┤
//!                        │                      ▼
//!                 CouponInvalid       recompute totals (no discount)
//!                                               │
//!                                               ▼
//!                                  attach { name, discount } and
//!                                  derive total_price_after_discount
//! ```
//!
//! Whether a stored coupon is re-checked for expiry on later reads is a
//! service-level setting; see [`Coupon::is_active_at`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{AppliedCoupon, Cart};
use crate::error::{CoreError, CoreResult};
use crate::pricing::recompute_totals;
use crate::types::{AppSettings, DiscountRate};
use crate::validation::{validate_coupon_code, validate_discount_bps};

/// A percentage-off coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Coupon {
    pub id: String,

    /// Unique, uppercased code.
    pub code: String,

    /// The coupon is usable strictly before this instant.
    #[ts(as = "String")]
    pub expire: DateTime<Utc>,

    pub discount: DiscountRate,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Creates a coupon, normalizing the code and checking the discount is
    /// within 1% to 100%.
    pub fn new(code: &str, expire: DateTime<Utc>, discount: DiscountRate) -> CoreResult<Self> {
        let code = validate_coupon_code(code)?;
        validate_discount_bps(discount.bps())?;

        let now = Utc::now();
        Ok(Coupon {
            id: uuid::Uuid::new_v4().to_string(),
            code,
            expire,
            discount,
            created_at: now,
            updated_at: now,
        })
    }

    /// True while `now` is before the expiry instant.
    #[inline]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expire > now
    }

    /// The snapshot stored on carts and orders.
    pub fn applied(&self) -> AppliedCoupon {
        AppliedCoupon {
            name: self.code.clone(),
            discount: self.discount,
        }
    }
}

/// Normalizes a shopper-entered code for lookup.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Attaches `coupon` to an already reconciled cart and recomputes totals.
///
/// ## When This Fails
/// - `CouponInvalid` if the coupon has expired at `now`
pub fn apply_coupon(
    cart: &mut Cart,
    coupon: &Coupon,
    settings: &AppSettings,
    now: DateTime<Utc>,
) -> CoreResult<()> {
    if !coupon.is_active_at(now) {
        return Err(CoreError::CouponInvalid);
    }

    cart.coupon = None;
    recompute_totals(cart, settings);

    // An empty cart keeps no coupon
    if cart.is_empty() {
        return Ok(());
    }

    cart.coupon = Some(coupon.applied());
    recompute_totals(cart, settings);
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
