//! # Settings Repository
//!
//! The app settings singleton: tax and shipping charges added to every
//! non-empty cart. The table's `CHECK (id = 1)` makes a second row
//! impossible; reads fall back to zero charges when no row exists.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use bazaar_core::{AppSettings, Money};

#[derive(Debug, sqlx::FromRow)]
struct SettingsRow {
    tax_cents: i64,
    shipping_cents: i64,
}

/// Repository for the settings singleton.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Current settings, or zero charges when none were ever created.
    pub async fn get(&self) -> DbResult<AppSettings> {
        let row: Option<SettingsRow> =
            sqlx::query_as("SELECT tax_cents, shipping_cents FROM app_settings WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row
            .map(|row| AppSettings {
                tax_price: Money::from_cents(row.tax_cents),
                shipping_price: Money::from_cents(row.shipping_cents),
            })
            .unwrap_or_default())
    }

    /// Creates the settings record.
    ///
    /// ## Errors
    /// * `DbError::UniqueViolation` - settings already exist
    pub async fn create(&self, settings: &AppSettings) -> DbResult<AppSettings> {
        info!(
            tax = %settings.tax_price,
            shipping = %settings.shipping_price,
            "Creating app settings"
        );

        sqlx::query(
            "INSERT INTO app_settings (id, tax_cents, shipping_cents, updated_at) VALUES (1, ?1, ?2, ?3)",
        )
        .bind(settings.tax_price.cents())
        .bind(settings.shipping_price.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("app settings", "singleton"),
            other => other,
        })?;

        Ok(*settings)
    }

    /// Writes the settings, creating the record when missing.
    pub async fn update(&self, settings: &AppSettings) -> DbResult<AppSettings> {
        debug!(
            tax = %settings.tax_price,
            shipping = %settings.shipping_price,
            "Updating app settings"
        );

        sqlx::query(
            r#"
            INSERT INTO app_settings (id, tax_cents, shipping_cents, updated_at)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                tax_cents = excluded.tax_cents,
                shipping_cents = excluded.shipping_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(settings.tax_price.cents())
        .bind(settings.shipping_price.cents())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(*settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn settings(tax: i64, shipping: i64) -> AppSettings {
        AppSettings {
            tax_price: Money::from_cents(tax),
            shipping_price: Money::from_cents(shipping),
        }
    }

    #[tokio::test]
    async fn test_defaults_to_zero() {
        let db = test_db().await;
        assert_eq!(db.settings().get().await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_create_once() {
        let db = test_db().await;
        db.settings().create(&settings(150, 500)).await.unwrap();
        assert_eq!(db.settings().get().await.unwrap(), settings(150, 500));

        let err = db.settings().create(&settings(1, 1)).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(db.settings().get().await.unwrap(), settings(150, 500));
    }

    #[tokio::test]
    async fn test_update_upserts() {
        let db = test_db().await;
        db.settings().update(&settings(100, 200)).await.unwrap();
        db.settings().update(&settings(300, 400)).await.unwrap();
        assert_eq!(db.settings().get().await.unwrap(), settings(300, 400));

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_settings")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
