//! # Product Repository
//!
//! Database operations for products and their size variants.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products                               product_sizes                   │
//! │  ───────────────────────────            ─────────────────────────────   │
//! │  id            "p1"          ◄──────┐   product_id  "p2"                │
//! │  price_cents   1000                 │   size        "M"                 │
//! │  quantity      10     (flat)        └── quantity    5                   │
//! │                                         price_cents 1500                │
//! │  id            "p2"                                                     │
//! │  price_cents   NULL                     one row per size, cascades      │
//! │  quantity      NULL   (sized)           with the product                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads return [`ProductRecord`]s: the raw shape, unclassified. Callers
//! decide whether an unpurchasable shape is an error (adding to a cart) or
//! a vanished product (reconciling a cart).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::{normalize_size, Money, Product, ProductRecord, SizeVariant};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    title: String,
    color: Option<String>,
    price_cents: Option<i64>,
    quantity: Option<i64>,
    price_after_discount_cents: Option<i64>,
    sold: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SizeRow {
    product_id: String,
    size: String,
    quantity: i64,
    price_cents: i64,
    price_after_discount_cents: Option<i64>,
}

impl ProductRow {
    fn into_record(self, sizes: Vec<SizeVariant>) -> ProductRecord {
        ProductRecord {
            id: self.id,
            title: self.title,
            color: self.color,
            price: self.price_cents.map(Money::from_cents),
            quantity: self.quantity,
            price_after_discount: self.price_after_discount_cents.map(Money::from_cents),
            sizes,
            sold: self.sold,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<SizeRow> for SizeVariant {
    fn from(row: SizeRow) -> Self {
        SizeVariant {
            size: row.size,
            quantity: row.quantity,
            price: Money::from_cents(row.price_cents),
            price_after_discount: row.price_after_discount_cents.map(Money::from_cents),
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, title, color, price_cents, quantity, \
     price_after_discount_cents, sold, created_at, updated_at";

const SIZE_COLUMNS: &str = "product_id, size, quantity, price_cents, price_after_discount_cents";

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let record = repo.get_by_id("uuid-here").await?;
/// let product = record.map(ProductRecord::into_product).transpose()?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product record (with sizes) by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductRecord>> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let sizes: Vec<SizeRow> = sqlx::query_as(&format!(
            "SELECT {SIZE_COLUMNS} FROM product_sizes WHERE product_id = ?1 ORDER BY position"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_record(sizes.into_iter().map(SizeVariant::from).collect())))
    }

    /// Loads every product in `ids` that still exists. Missing ids are
    /// simply absent from the result.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<ProductRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(count = ids.len(), "Loading products");

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("));
        let mut list = query.separated(", ");
        for id in ids {
            list.push_bind(id);
        }
        list.push_unseparated(")");
        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {SIZE_COLUMNS} FROM product_sizes WHERE product_id IN ("
        ));
        let mut list = query.separated(", ");
        for id in ids {
            list.push_bind(id);
        }
        list.push_unseparated(") ORDER BY product_id, position");
        let size_rows: Vec<SizeRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut sizes: HashMap<String, Vec<SizeVariant>> = HashMap::new();
        for row in size_rows {
            sizes
                .entry(row.product_id.clone())
                .or_default()
                .push(SizeVariant::from(row));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let variants = sizes.remove(&row.id).unwrap_or_default();
                row.into_record(variants)
            })
            .collect())
    }

    /// Inserts a validated product.
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        self.insert_record(&ProductRecord::from(product.clone())).await?;
        Ok(product.clone())
    }

    /// Inserts a raw record exactly as given, whatever its shape. Size
    /// labels are still stored normalized.
    ///
    /// Used by imports; the storefront only ever writes through [`insert`].
    ///
    /// [`insert`]: ProductRepository::insert
    pub async fn insert_record(&self, record: &ProductRecord) -> DbResult<()> {
        debug!(id = %record.id, title = %record.title, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, title, color, price_cents, quantity,
                price_after_discount_cents, sold, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.color)
        .bind(record.price.map(|m| m.cents()))
        .bind(record.quantity)
        .bind(record.price_after_discount.map(|m| m.cents()))
        .bind(record.sold)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        write_sizes(&mut tx, &record.id, &record.sizes).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Replaces a product's columns and its full size list.
    ///
    /// `sold` is owned by checkout and is left untouched.
    pub async fn update(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, "Updating product");

        let record = ProductRecord::from(product.clone());
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE products SET
                title = ?2,
                color = ?3,
                price_cents = ?4,
                quantity = ?5,
                price_after_discount_cents = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.color)
        .bind(record.price.map(|m| m.cents()))
        .bind(record.quantity)
        .bind(record.price_after_discount.map(|m| m.cents()))
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        sqlx::query("DELETE FROM product_sizes WHERE product_id = ?1")
            .bind(&record.id)
            .execute(&mut *tx)
            .await?;
        write_sizes(&mut tx, &record.id, &record.sizes).await?;

        tx.commit().await?;

        let mut updated = product.clone();
        updated.updated_at = now;
        Ok(updated)
    }

    /// Deletes a product (its sizes cascade). Carts holding it drop the
    /// line on their next reconciliation.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn write_sizes(
    conn: &mut SqliteConnection,
    product_id: &str,
    sizes: &[SizeVariant],
) -> DbResult<()> {
    for (position, variant) in sizes.iter().enumerate() {
        // Stored uppercase so checkout's exact match agrees with cart matching
        let size = normalize_size(&variant.size);
        sqlx::query(
            r#"
            INSERT INTO product_sizes (
                product_id, size, quantity, price_cents,
                price_after_discount_cents, position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(product_id)
        .bind(&size)
        .bind(variant.quantity)
        .bind(variant.price.cents())
        .bind(variant.price_after_discount.map(|m| m.cents()))
        .bind(position as i64)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &size),
            other => other,
        })?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use bazaar_core::{CoreError, Money, Product, ProductPricing, ProductRecord, SizeVariant};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn tee() -> Product {
        Product::new(
            "Tee",
            Some("black"),
            ProductPricing::sized(vec![
                SizeVariant::new("S", 0, Money::from_cents(1500)),
                SizeVariant::new("M", 5, Money::from_cents(1500)).with_discount(Money::from_cents(1200)),
            ]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_flat_product() {
        let db = test_db().await;
        let mug = Product::new("Mug", None, ProductPricing::flat(Money::from_cents(1000), 10)).unwrap();
        db.products().insert(&mug).await.unwrap();

        let loaded = db.products().get_by_id(&mug.id).await.unwrap().unwrap();
        assert_eq!(loaded.price, Some(Money::from_cents(1000)));
        assert_eq!(loaded.quantity, Some(10));
        assert!(loaded.sizes.is_empty());
        assert_eq!(loaded.into_product().unwrap().pricing, mug.pricing);
    }

    #[tokio::test]
    async fn test_sized_product_keeps_size_order() {
        let db = test_db().await;
        let tee = tee();
        db.products().insert(&tee).await.unwrap();

        let loaded = db.products().get_by_id(&tee.id).await.unwrap().unwrap();
        let sizes: Vec<_> = loaded.sizes.iter().map(|s| s.size.as_str()).collect();
        assert_eq!(sizes, ["S", "M"]);
        assert_eq!(loaded.sizes[1].unit_price().cents(), 1200);
        assert_eq!(loaded.into_product().unwrap().pricing, tee.pricing);
    }

    #[tokio::test]
    async fn test_imported_size_labels_are_normalized() {
        let db = test_db().await;
        let mut record = ProductRecord::from(tee());
        record.sizes[1].size = " m".to_string();
        db.products().insert_record(&record).await.unwrap();

        let loaded = db.products().get_by_id(&record.id).await.unwrap().unwrap();
        let sizes: Vec<_> = loaded.sizes.iter().map(|s| s.size.as_str()).collect();
        assert_eq!(sizes, ["S", "M"]);

        let mut clash = ProductRecord::from(tee());
        clash.sizes[1].size = "s".to_string();
        let err = db.products().insert_record(&clash).await.unwrap_err();
        assert!(matches!(err, crate::DbError::UniqueViolation { ref value, .. } if value == "S"));
        assert!(db.products().get_by_id(&clash.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let db = test_db().await;
        assert!(db.products().get_by_id("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_many_skips_missing_ids() {
        let db = test_db().await;
        let tee = tee();
        let mug = Product::new("Mug", None, ProductPricing::flat(Money::from_cents(1000), 10)).unwrap();
        db.products().insert(&tee).await.unwrap();
        db.products().insert(&mug).await.unwrap();

        let records = db
            .products()
            .get_many(&[tee.id.clone(), "gone".to_string(), mug.id.clone()])
            .await
            .unwrap();
        assert_eq!(records.len(), 2);

        let tee_record = records.iter().find(|r| r.id == tee.id).unwrap();
        assert_eq!(tee_record.sizes.len(), 2);
        assert!(db.products().get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unpurchasable_record_is_stored_and_flagged_on_load() {
        let db = test_db().await;
        let mut record = ProductRecord::from(tee());
        record.price = Some(Money::from_cents(999));
        record.quantity = Some(3);
        db.products().insert_record(&record).await.unwrap();

        let loaded = db.products().get_by_id(&record.id).await.unwrap().unwrap();
        assert!(matches!(
            loaded.into_product(),
            Err(CoreError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_replaces_sizes() {
        let db = test_db().await;
        let mut tee = tee();
        db.products().insert(&tee).await.unwrap();

        tee.title = "Tee v2".to_string();
        tee.pricing = ProductPricing::sized(vec![SizeVariant::new("L", 2, Money::from_cents(1800))]);
        db.products().update(&tee).await.unwrap();

        let loaded = db
            .products()
            .get_by_id(&tee.id)
            .await
            .unwrap()
            .unwrap()
            .into_product()
            .unwrap();
        assert_eq!(loaded.title, "Tee v2");
        assert!(loaded.pricing.find_variant("M").is_none());
        assert_eq!(loaded.pricing.find_variant("l").map(|v| v.quantity), Some(2));
    }

    #[tokio::test]
    async fn test_delete_and_count() {
        let db = test_db().await;
        let tee = tee();
        db.products().insert(&tee).await.unwrap();
        assert_eq!(db.products().count().await.unwrap(), 1);

        db.products().delete(&tee.id).await.unwrap();
        assert_eq!(db.products().count().await.unwrap(), 0);
        assert!(db.products().delete(&tee.id).await.is_err());

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_sizes")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
