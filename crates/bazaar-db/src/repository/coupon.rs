//! # Coupon Repository
//!
//! Coupon codes are stored uppercase and matched exactly.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bazaar_core::coupon::normalize_code;
use bazaar_core::{Coupon, DiscountRate};

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: String,
    code: String,
    expire: DateTime<Utc>,
    discount_bps: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CouponRow> for Coupon {
    fn from(row: CouponRow) -> Self {
        Coupon {
            id: row.id,
            code: row.code,
            expire: row.expire,
            discount: DiscountRate::from_bps(row.discount_bps.clamp(0, u32::MAX as i64) as u32),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    /// Creates a new CouponRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Inserts a coupon.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - the code is already taken
    pub async fn insert(&self, coupon: &Coupon) -> DbResult<Coupon> {
        debug!(code = %coupon.code, "Inserting coupon");

        sqlx::query(
            r#"
            INSERT INTO coupons (id, code, expire, discount_bps, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&coupon.id)
        .bind(&coupon.code)
        .bind(coupon.expire)
        .bind(coupon.discount.bps() as i64)
        .bind(coupon.created_at)
        .bind(coupon.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("coupon code", &coupon.code),
            other => other,
        })?;

        Ok(coupon.clone())
    }

    /// Gets a coupon by code, expired or not. The code is normalized first.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let row: Option<CouponRow> = sqlx::query_as(
            r#"
            SELECT id, code, expire, discount_bps, created_at, updated_at
            FROM coupons
            WHERE code = ?1
            "#,
        )
        .bind(normalize_code(code))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Coupon::from))
    }

    /// Gets a coupon by code only if it has not expired at `now`.
    ///
    /// Unknown and expired codes are indistinguishable to the caller.
    pub async fn find_active(&self, code: &str, now: DateTime<Utc>) -> DbResult<Option<Coupon>> {
        Ok(self
            .get_by_code(code)
            .await?
            .filter(|coupon| coupon.is_active_at(now)))
    }

    /// Deletes a coupon by id. Carts already carrying its code keep the
    /// discount unless expiry revalidation is switched on.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_find_active_matches_normalized_code() {
        let db = test_db().await;
        let now = Utc::now();
        let coupon = Coupon::new("save10", now + Duration::days(7), DiscountRate::from_percent(10)).unwrap();
        db.coupons().insert(&coupon).await.unwrap();

        let found = db.coupons().find_active(" Save10 ", now).await.unwrap().unwrap();
        assert_eq!(found.code, "SAVE10");
        assert_eq!(found.discount, DiscountRate::from_percent(10));
    }

    #[tokio::test]
    async fn test_expired_coupon_is_not_active() {
        let db = test_db().await;
        let now = Utc::now();
        let coupon = Coupon::new("OLD", now - Duration::hours(1), DiscountRate::from_percent(10)).unwrap();
        db.coupons().insert(&coupon).await.unwrap();

        assert!(db.coupons().find_active("OLD", now).await.unwrap().is_none());
        assert!(db.coupons().get_by_code("OLD").await.unwrap().is_some());
        assert!(db.coupons().find_active("NOPE", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_code_is_rejected() {
        let db = test_db().await;
        let expire = Utc::now() + Duration::days(1);
        db.coupons()
            .insert(&Coupon::new("DUP", expire, DiscountRate::from_percent(5)).unwrap())
            .await
            .unwrap();

        let err = db
            .coupons()
            .insert(&Coupon::new("dup", expire, DiscountRate::from_percent(50)).unwrap())
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_delete() {
        let db = test_db().await;
        let coupon = Coupon::new("GONE", Utc::now() + Duration::days(1), DiscountRate::from_percent(5)).unwrap();
        db.coupons().insert(&coupon).await.unwrap();

        db.coupons().delete(&coupon.id).await.unwrap();
        assert!(db.coupons().get_by_code("GONE").await.unwrap().is_none());
        assert!(matches!(
            db.coupons().delete(&coupon.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
