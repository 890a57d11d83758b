//! # Cart Repository
//!
//! Per-user carts. Lines are stored as one JSON document per cart.
//!
//! ## Optimistic Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Request A                          Request B                           │
//! │  ─────────                          ─────────                           │
//! │  load cart (version 3)              load cart (version 3)               │
//! │  reconcile, mutate, price           reconcile, mutate, price            │
//! │  UPDATE ... WHERE version = 3  ✓    │                                   │
//! │    → version 4                      │                                   │
//! │                                     UPDATE ... WHERE version = 3  ✗     │
//! │                                       → 0 rows → DbError::Conflict      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! A new cart is inserted with version 1. A second insert for the same user
//! hits the unique owner index and is reported as a conflict too.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::{AppliedCoupon, Cart, CartItem, DiscountRate, Money};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: String,
    user_id: String,
    items: Json<Vec<CartItem>>,
    tax_cents: i64,
    shipping_cents: i64,
    total_cents: i64,
    coupon_name: Option<String>,
    coupon_discount_bps: Option<i64>,
    total_after_discount_cents: Option<i64>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Cart {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            tax_price: Money::from_cents(row.tax_cents),
            shipping_price: Money::from_cents(row.shipping_cents),
            total_price: Money::from_cents(row.total_cents),
            coupon: decode_coupon(row.coupon_name, row.coupon_discount_bps),
            total_price_after_discount: row.total_after_discount_cents.map(Money::from_cents),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Rebuilds an applied coupon from its two columns; both or nothing.
pub(crate) fn decode_coupon(name: Option<String>, bps: Option<i64>) -> Option<AppliedCoupon> {
    match (name, bps) {
        (Some(name), Some(bps)) => Some(AppliedCoupon {
            name,
            discount: DiscountRate::from_bps(bps.clamp(0, u32::MAX as i64) as u32),
        }),
        _ => None,
    }
}

const CART_COLUMNS: &str = "id, user_id, items, tax_cents, shipping_cents, total_cents, \
     coupon_name, coupon_discount_bps, total_after_discount_cents, version, created_at, updated_at";

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Gets the cart owned by `user_id`.
    pub async fn get_by_user(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let row: Option<CartRow> =
            sqlx::query_as(&format!("SELECT {CART_COLUMNS} FROM carts WHERE user_id = ?1"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Cart::from))
    }

    /// Gets a cart by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Cart>> {
        let row: Option<CartRow> =
            sqlx::query_as(&format!("SELECT {CART_COLUMNS} FROM carts WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Cart::from))
    }

    /// Persists `cart`, bumping its version on success.
    ///
    /// ## Errors
    /// * `DbError::Conflict` - the stored version moved on, the cart was
    ///   deleted meanwhile, or another cart was created for the same user
    pub async fn save(&self, cart: &mut Cart) -> DbResult<()> {
        let now = Utc::now();
        let coupon_name = cart.coupon.as_ref().map(|c| c.name.clone());
        let coupon_bps = cart.coupon.as_ref().map(|c| c.discount.bps() as i64);

        if cart.is_new() {
            debug!(cart_id = %cart.id, user_id = %cart.user_id, "Inserting cart");

            sqlx::query(
                r#"
                INSERT INTO carts (
                    id, user_id, items, tax_cents, shipping_cents, total_cents,
                    coupon_name, coupon_discount_bps, total_after_discount_cents,
                    version, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1, ?10, ?11)
                "#,
            )
            .bind(&cart.id)
            .bind(&cart.user_id)
            .bind(Json(&cart.items))
            .bind(cart.tax_price.cents())
            .bind(cart.shipping_price.cents())
            .bind(cart.total_price.cents())
            .bind(coupon_name)
            .bind(coupon_bps)
            .bind(cart.total_price_after_discount.map(|m| m.cents()))
            .bind(cart.created_at)
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::conflict("Cart", &cart.user_id),
                other => other,
            })?;

            cart.version = 1;
            cart.updated_at = now;
            return Ok(());
        }

        debug!(cart_id = %cart.id, version = cart.version, "Updating cart");

        let result = sqlx::query(
            r#"
            UPDATE carts SET
                items = ?3,
                tax_cents = ?4,
                shipping_cents = ?5,
                total_cents = ?6,
                coupon_name = ?7,
                coupon_discount_bps = ?8,
                total_after_discount_cents = ?9,
                version = version + 1,
                updated_at = ?10
            WHERE id = ?1 AND version = ?2
            "#,
        )
        .bind(&cart.id)
        .bind(cart.version)
        .bind(Json(&cart.items))
        .bind(cart.tax_price.cents())
        .bind(cart.shipping_price.cents())
        .bind(cart.total_price.cents())
        .bind(coupon_name)
        .bind(coupon_bps)
        .bind(cart.total_price_after_discount.map(|m| m.cents()))
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict("Cart", &cart.id));
        }

        cart.version += 1;
        cart.updated_at = now;
        Ok(())
    }

    /// Deletes a cart by id. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM carts WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes the cart owned by `user_id`. Returns whether one existed.
    pub async fn delete_by_user(&self, user_id: &str) -> DbResult<bool> {
        debug!(user_id = %user_id, "Clearing cart");
        let result = sqlx::query("DELETE FROM carts WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
