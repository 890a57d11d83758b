//! # Order Repository
//!
//! Orders and the checkout commit.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    commit_checkout(order, cart)                         │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    │                                                                    │
//! │    ├── INSERT INTO orders ...                                           │
//! │    │                                                                    │
//! │    ├── for each line:                                                   │
//! │    │     sized → UPDATE product_sizes SET quantity = quantity - n       │
//! │    │              WHERE ... AND quantity >= n                           │
//! │    │             UPDATE products SET sold = sold + n                    │
//! │    │     flat  → UPDATE products SET quantity = quantity - n,           │
//! │    │              sold = sold + n WHERE ... AND quantity >= n           │
//! │    │     0 rows → StockExhausted ──────────────► ROLLBACK               │
//! │    │                                                                    │
//! │    ├── DELETE FROM carts WHERE id = ? AND version = ?                   │
//! │    │     0 rows → Conflict ────────────────────► ROLLBACK               │
//! │    │                                                                    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! The three effects land together or not at all.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::cart::decode_coupon;
use bazaar_core::{
    normalize_size, Cart, CartItem, Money, Order, PaymentMethodType, ShippingAddress,
    StockMovement,
};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    items: Json<Vec<CartItem>>,
    shipping_address: Json<ShippingAddress>,
    tax_cents: i64,
    shipping_cents: i64,
    total_cents: i64,
    coupon_name: Option<String>,
    coupon_discount_bps: Option<i64>,
    total_after_discount_cents: Option<i64>,
    payment_method: PaymentMethodType,
    payment_reference: Option<String>,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            user_id: row.user_id,
            items: row.items.0,
            shipping_address: row.shipping_address.0,
            tax_price: Money::from_cents(row.tax_cents),
            shipping_price: Money::from_cents(row.shipping_cents),
            total_price: Money::from_cents(row.total_cents),
            coupon: decode_coupon(row.coupon_name, row.coupon_discount_bps),
            total_price_after_discount: row.total_after_discount_cents.map(Money::from_cents),
            payment_method: row.payment_method,
            payment_reference: row.payment_reference,
            is_paid: row.is_paid,
            paid_at: row.paid_at,
            is_delivered: row.is_delivered,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str = "id, user_id, items, shipping_address, tax_cents, shipping_cents, \
     total_cents, coupon_name, coupon_discount_bps, total_after_discount_cents, payment_method, \
     payment_reference, is_paid, paid_at, is_delivered, delivered_at, created_at, updated_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an order by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Order::from))
    }

    /// Orders placed by `user_id`, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Finds the order created for payment session `reference`.
    pub async fn get_by_payment_reference(&self, reference: &str) -> DbResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_reference = ?1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Order::from))
    }

    // =========================================================================
    // Status Flags
    // =========================================================================

    /// Sets or clears the paid flag.
    pub async fn set_paid(&self, id: &str, paid: bool, now: DateTime<Utc>) -> DbResult<Order> {
        let mut order = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;
        order.set_paid(paid, now);

        sqlx::query("UPDATE orders SET is_paid = ?2, paid_at = ?3, updated_at = ?4 WHERE id = ?1")
            .bind(&order.id)
            .bind(order.is_paid)
            .bind(order.paid_at)
            .bind(order.updated_at)
            .execute(&self.pool)
            .await?;

        info!(order_id = %order.id, paid, "Order paid flag updated");
        Ok(order)
    }

    /// Sets or clears the delivered flag.
    pub async fn set_delivered(
        &self,
        id: &str,
        delivered: bool,
        now: DateTime<Utc>,
    ) -> DbResult<Order> {
        let mut order = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;
        order.set_delivered(delivered, now);

        sqlx::query(
            "UPDATE orders SET is_delivered = ?2, delivered_at = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(&order.id)
        .bind(order.is_delivered)
        .bind(order.delivered_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        info!(order_id = %order.id, delivered, "Order delivered flag updated");
        Ok(order)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Inserts `order`, takes its lines out of stock and deletes `cart`, in
    /// one transaction.
    ///
    /// ## Errors
    /// * `DbError::StockExhausted` - a line asks for more than is left
    /// * `DbError::Conflict` - the cart changed or vanished since it was loaded
    /// * `DbError::UniqueViolation` - an order already carries this payment reference
    pub async fn commit_checkout(&self, order: &Order, cart: &Cart) -> DbResult<()> {
        debug!(
            order_id = %order.id,
            cart_id = %cart.id,
            lines = order.items.len(),
            "Committing checkout"
        );

        let mut tx = self.pool.begin().await?;

        insert_order(&mut tx, order).await?;

        for movement in order.stock_movements() {
            take_stock(&mut tx, &movement).await?;
        }

        let deleted = sqlx::query("DELETE FROM carts WHERE id = ?1 AND version = ?2")
            .bind(&cart.id)
            .bind(cart.version)
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            warn!(cart_id = %cart.id, version = cart.version, "Cart changed during checkout");
            return Err(DbError::conflict("Cart", &cart.id));
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            payment_method = order.payment_method.as_str(),
            amount = %order.amount_due(),
            "Order created"
        );
        Ok(())
    }
}

async fn insert_order(tx: &mut Transaction<'_, Sqlite>, order: &Order) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, items, shipping_address, tax_cents, shipping_cents, total_cents,
            coupon_name, coupon_discount_bps, total_after_discount_cents, payment_method,
            payment_reference, is_paid, paid_at, is_delivered, delivered_at,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(Json(&order.items))
    .bind(Json(&order.shipping_address))
    .bind(order.tax_price.cents())
    .bind(order.shipping_price.cents())
    .bind(order.total_price.cents())
    .bind(order.coupon.as_ref().map(|c| c.name.clone()))
    .bind(order.coupon.as_ref().map(|c| c.discount.bps() as i64))
    .bind(order.total_price_after_discount.map(|m| m.cents()))
    .bind(order.payment_method)
    .bind(&order.payment_reference)
    .bind(order.is_paid)
    .bind(order.paid_at)
    .bind(order.is_delivered)
    .bind(order.delivered_at)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate(
            "payment_reference",
            order.payment_reference.as_deref().unwrap_or_default(),
        ),
        other => other,
    })?;
    Ok(())
}

/// Guarded decrement for one line. Sized lines draw from the variant row,
/// flat lines from the product row; `sold` always lives on the product.
async fn take_stock(tx: &mut Transaction<'_, Sqlite>, movement: &StockMovement) -> DbResult<()> {
    let n = movement.quantity;
    let size = movement.size.as_deref().map(normalize_size);

    let taken = match &size {
        Some(size) => {
            let result = sqlx::query(
                r#"
                UPDATE product_sizes SET quantity = quantity - ?3
                WHERE product_id = ?1 AND size = ?2 AND quantity >= ?3
                "#,
            )
            .bind(&movement.product_id)
            .bind(size)
            .bind(n)
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() > 0 {
                sqlx::query("UPDATE products SET sold = sold + ?2, updated_at = ?3 WHERE id = ?1")
                    .bind(&movement.product_id)
                    .bind(n)
                    .bind(Utc::now())
                    .execute(&mut **tx)
                    .await?;
                true
            } else {
                false
            }
        }
        None => {
            let result = sqlx::query(
                r#"
                UPDATE products SET quantity = quantity - ?2, sold = sold + ?2, updated_at = ?3
                WHERE id = ?1 AND quantity >= ?2
                "#,
            )
            .bind(&movement.product_id)
            .bind(n)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await?;
            result.rows_affected() > 0
        }
    };

    if taken {
        return Ok(());
    }

    let available: Option<i64> = match &size {
        Some(size) => {
            sqlx::query_scalar(
                "SELECT quantity FROM product_sizes WHERE product_id = ?1 AND size = ?2",
            )
            .bind(&movement.product_id)
            .bind(size)
            .fetch_optional(&mut **tx)
            .await?
        }
        None => sqlx::query_scalar::<_, Option<i64>>("SELECT quantity FROM products WHERE id = ?1")
            .bind(&movement.product_id)
            .fetch_optional(&mut **tx)
            .await?
            .flatten(),
    };

    warn!(
        product_id = %movement.product_id,
        size = ?movement.size,
        requested = n,
        available = ?available,
        "Stock exhausted at checkout"
    );

    Err(DbError::StockExhausted {
        product_id: movement.product_id.clone(),
        size: movement.size.clone(),
        available: available.unwrap_or(0),
        requested: n,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
