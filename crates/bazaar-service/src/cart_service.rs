//! # Cart Service
//!
//! Every cart read and mutation runs the same pipeline.
//!
//! ## Request Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  load cart (by user)                                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  reconcile against live products      lines dropped / repriced /        │
//! │       │                               recoloured                        │
//! │       ▼                                                                 │
//! │  revalidate coupon expiry             only when configured              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  mutation (add / set qty / remove / coupon)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  recompute totals with current settings                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  save (compare-and-swap on version) ──► Conflict on a lost race         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stored totals are never trusted: they are recomputed on every call and
//! saved only as a snapshot for responses.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ShopConfig;
use crate::error::{ServiceError, ServiceResult};
use bazaar_core::coupon::apply_coupon;
use bazaar_core::pricing::recompute_totals;
use bazaar_core::reconcile::reconcile;
use bazaar_core::validation::validate_coupon_code;
use bazaar_core::{Cart, CoreError, ProductIndex, ReconcileReport, RepeatAddPolicy};
use bazaar_db::Database;

/// A cart together with its line count, as returned by every cart call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub item_count: usize,
    pub cart: Cart,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        CartView {
            item_count: cart.item_count(),
            cart,
        }
    }
}

/// Cart operations for one shop.
#[derive(Debug, Clone)]
pub struct CartService {
    db: Database,
    repeat_add: RepeatAddPolicy,
    revalidate_coupon_expiry: bool,
}

impl CartService {
    pub fn new(db: Database, config: &ShopConfig) -> Self {
        CartService {
            db,
            repeat_add: config.repeat_add,
            revalidate_coupon_expiry: config.revalidate_coupon_expiry,
        }
    }

    /// The user's cart, reconciled and repriced.
    ///
    /// The cart is only written back when reconciliation or pricing changed
    /// it, so concurrent reads never bump its version.
    ///
    /// ## Errors
    /// * `NotFound` - the user has no cart
    pub async fn get_cart(&self, user_id: &str) -> ServiceResult<CartView> {
        let mut cart = self.load_cart(user_id).await?;
        let loaded = cart.clone();

        self.refresh(&mut cart, Utc::now()).await?;
        let settings = self.db.settings().get().await?;
        recompute_totals(&mut cart, &settings);

        if cart != loaded {
            self.db.carts().save(&mut cart).await?;
        }
        Ok(cart.into())
    }

    /// Adds `quantity` of `product_id` (in `size`) to the user's cart,
    /// creating the cart on first use.
    ///
    /// An existing line for the same product and size is replaced or
    /// incremented according to the configured repeat-add policy.
    pub async fn add_item(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        size: Option<&str>,
    ) -> ServiceResult<CartView> {
        debug!(user_id, product_id, quantity, size = ?size, "Adding to cart");

        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product not found: {product_id}")))?
            .into_product()
            .map_err(|e| {
                warn!(product_id, "Product is neither flat nor sized");
                ServiceError::from(e)
            })?;

        let mut cart = match self.db.carts().get_by_user(user_id).await? {
            Some(mut cart) => {
                self.refresh(&mut cart, Utc::now()).await?;
                cart
            }
            None => {
                debug!(user_id, "Creating cart");
                Cart::new(user_id)
            }
        };

        cart.upsert_item(&product, quantity, size, self.repeat_add)?;
        self.price_and_save(&mut cart).await?;
        Ok(cart.into())
    }

    /// Sets the quantity of one line, re-checking stock against the line's
    /// own product and size.
    pub async fn update_item_quantity(
        &self,
        user_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> ServiceResult<CartView> {
        let mut cart = self.load_cart(user_id).await?;
        let products = self.refresh(&mut cart, Utc::now()).await?;

        let product_id = cart
            .find_item(item_id)
            .map(|item| item.product_id.clone())
            .ok_or_else(|| CoreError::CartItemNotFound(item_id.to_string()))?;
        let product = products
            .get(&product_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Product not found: {product_id}")))?;

        cart.set_item_quantity(item_id, product, quantity)?;
        self.price_and_save(&mut cart).await?;
        Ok(cart.into())
    }

    /// Removes one line.
    pub async fn remove_item(&self, user_id: &str, item_id: &str) -> ServiceResult<CartView> {
        let mut cart = self.load_cart(user_id).await?;
        self.refresh(&mut cart, Utc::now()).await?;

        let removed = cart.remove_item(item_id)?;
        debug!(cart_id = %cart.id, item_id, product_id = %removed.product_id, "Line removed");

        self.price_and_save(&mut cart).await?;
        Ok(cart.into())
    }

    /// Deletes the user's cart. Clearing a missing cart is not an error.
    pub async fn clear_cart(&self, user_id: &str) -> ServiceResult<()> {
        let existed = self.db.carts().delete_by_user(user_id).await?;
        debug!(user_id, existed, "Cart cleared");
        Ok(())
    }

    /// Applies coupon `code` to the user's cart.
    ///
    /// ## Errors
    /// * `NotFound` - the code is unknown or expired (indistinguishable),
    ///   or the user has no cart
    pub async fn apply_coupon(&self, user_id: &str, code: &str) -> ServiceResult<CartView> {
        let now = Utc::now();
        let code = validate_coupon_code(code).map_err(CoreError::from)?;

        let coupon = self
            .db
            .coupons()
            .find_active(&code, now)
            .await?
            .ok_or(CoreError::CouponInvalid)?;

        let mut cart = self.load_cart(user_id).await?;
        self.refresh(&mut cart, now).await?;

        let settings = self.db.settings().get().await?;
        apply_coupon(&mut cart, &coupon, &settings, now)?;
        self.db.carts().save(&mut cart).await?;

        info!(
            cart_id = %cart.id,
            code = %coupon.code,
            total = %cart.total_price,
            discounted = ?cart.total_price_after_discount.map(|m| m.to_string()),
            "Coupon applied"
        );
        Ok(cart.into())
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    async fn load_cart(&self, user_id: &str) -> ServiceResult<Cart> {
        self.db
            .carts()
            .get_by_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No cart for user {user_id}")))
    }

    /// Reconciles `cart` and, when configured, drops an expired coupon.
    /// Returns the products the cart was checked against.
    pub(crate) async fn refresh(
        &self,
        cart: &mut Cart,
        now: DateTime<Utc>,
    ) -> ServiceResult<ProductIndex> {
        let (products, _) = refresh_cart(&self.db, cart, self.revalidate_coupon_expiry, now).await?;
        Ok(products)
    }

    async fn price_and_save(&self, cart: &mut Cart) -> ServiceResult<()> {
        let settings = self.db.settings().get().await?;
        recompute_totals(cart, &settings);
        self.db.carts().save(cart).await?;
        Ok(())
    }
}

/// Loads the products `cart` refers to and reconciles the cart against them.
pub(crate) async fn refresh_cart(
    db: &Database,
    cart: &mut Cart,
    revalidate_coupon_expiry: bool,
    now: DateTime<Utc>,
) -> ServiceResult<(ProductIndex, ReconcileReport)> {
    let mut ids: Vec<String> = cart.items.iter().map(|i| i.product_id.clone()).collect();
    ids.sort();
    ids.dedup();

    let products = ProductIndex::from_records(db.products().get_many(&ids).await?);
    for product_id in products.unpurchasable() {
        warn!(product_id = %product_id, "Stored product is neither flat nor sized");
    }

    let report = reconcile(cart, &products);
    for line in &report.removed {
        warn!(
            cart_id = %cart.id,
            item_id = %line.item_id,
            product_id = %line.product_id,
            reason = ?line.reason,
            "Dropped cart line"
        );
    }
    if !report.repriced.is_empty() || !report.recolored.is_empty() {
        debug!(
            cart_id = %cart.id,
            repriced = report.repriced.len(),
            recolored = report.recolored.len(),
            "Cart lines refreshed"
        );
    }

    if revalidate_coupon_expiry {
        if let Some(applied) = &cart.coupon {
            let active = db.coupons().find_active(&applied.name, now).await?;
            if active.is_none() {
                info!(cart_id = %cart.id, code = %applied.name, "Dropping expired coupon");
                cart.coupon = None;
            }
        }
    }

    Ok((products, report))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{
        AppSettings, Coupon, DiscountRate, Money, Product, ProductPricing, ProductRecord,
        SizeVariant,
    };
    use bazaar_db::DbConfig;
    use chrono::Duration;

    async fn setup(config: ShopConfig) -> (Database, CartService) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let service = CartService::new(db.clone(), &config);
        (db, service)
    }

    async fn flat(db: &Database, cents: i64, stock: i64) -> Product {
        let product =
            Product::new("Mug", Some("red"), ProductPricing::flat(Money::from_cents(cents), stock))
                .unwrap();
        db.products().insert(&product).await.unwrap()
    }

    async fn tee(db: &Database) -> Product {
        let product = Product::new(
            "Tee",
            None,
            ProductPricing::sized(vec![
                SizeVariant::new("S", 0, Money::from_cents(1500)),
                SizeVariant::new("M", 5, Money::from_cents(1500)),
            ]),
        )
        .unwrap();
        db.products().insert(&product).await.unwrap()
    }

    async fn set_settings(db: &Database, tax: i64, shipping: i64) {
        db.settings()
            .update(&AppSettings {
                tax_price: Money::from_cents(tax),
                shipping_price: Money::from_cents(shipping),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_then_read_totals() {
        let (db, service) = setup(ShopConfig::default()).await;
        set_settings(&db, 150, 500).await;
        let mug = flat(&db, 1000, 10).await;

        let added = service.add_item("u1", &mug.id, 2, None).await.unwrap();
        assert_eq!(added.item_count, 1);
        assert_eq!(added.cart.items[0].color.as_deref(), Some("red"));

        let view = service.get_cart("u1").await.unwrap();
        assert_eq!(view.cart.total_price, Money::from_cents(2000 + 150 + 500));
        assert_eq!(view.cart.tax_price, Money::from_cents(150));
        assert_eq!(view.cart.shipping_price, Money::from_cents(500));
    }

    #[tokio::test]
    async fn test_sized_product_scenario() {
        let (db, service) = setup(ShopConfig::default()).await;
        let tee = tee(&db).await;

        let err = service.add_item("u1", &tee.id, 1, Some("S")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));

        let err = service.add_item("u1", &tee.id, 10, Some("m")).await.unwrap_err();
        match err {
            ServiceError::InsufficientStock { available, requested, .. } => {
                assert_eq!(available, 5);
                assert_eq!(requested, 10);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        let err = service.add_item("u1", &tee.id, 1, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        let err = service.add_item("u1", &tee.id, 1, Some("XL")).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let view = service.add_item("u1", &tee.id, 3, Some("m")).await.unwrap();
        let line = &view.cart.items[0];
        assert_eq!(line.size.as_deref(), Some("M"));
        assert_eq!(line.line_total, Money::from_cents(4500));
    }

    #[tokio::test]
    async fn test_add_rejects_bad_products() {
        let (db, service) = setup(ShopConfig::default()).await;

        let err = service.add_item("u1", "missing", 1, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let mug = flat(&db, 1000, 0).await;
        let err = service.add_item("u1", &mug.id, 1, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));

        let err = service.add_item("u1", &mug.id, 1, Some("M")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        let now = Utc::now();
        let broken = ProductRecord {
            id: "broken".to_string(),
            title: "Both shapes".to_string(),
            color: None,
            price: Some(Money::from_cents(100)),
            quantity: Some(3),
            price_after_discount: None,
            sizes: vec![SizeVariant::new("M", 1, Money::from_cents(100))],
            sold: 0,
            created_at: now,
            updated_at: now,
        };
        db.products().insert_record(&broken).await.unwrap();
        let err = service.add_item("u1", "broken", 1, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
        assert_eq!(err.http_status(), 422);

        assert!(db.carts().get_by_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_repeat_add_replaces_by_default() {
        let (db, service) = setup(ShopConfig::default()).await;
        let mug = flat(&db, 1000, 10).await;

        service.add_item("u1", &mug.id, 2, None).await.unwrap();
        let view = service.add_item("u1", &mug.id, 3, None).await.unwrap();
        assert_eq!(view.item_count, 1);
        assert_eq!(view.cart.items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_repeat_add_can_increment() {
        let config = ShopConfig {
            repeat_add: RepeatAddPolicy::Increment,
            ..ShopConfig::default()
        };
        let (db, service) = setup(config).await;
        let mug = flat(&db, 1000, 4).await;

        service.add_item("u1", &mug.id, 2, None).await.unwrap();
        let view = service.add_item("u1", &mug.id, 2, None).await.unwrap();
        assert_eq!(view.cart.items[0].quantity, 4);

        let err = service.add_item("u1", &mug.id, 1, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock { available: 4, requested: 5, .. }));
    }

    #[tokio::test]
    async fn test_deleted_product_is_dropped_on_read() {
        let (db, service) = setup(ShopConfig::default()).await;
        set_settings(&db, 100, 200).await;
        let mug = flat(&db, 1000, 10).await;
        let tee = tee(&db).await;

        service.add_item("u1", &mug.id, 1, None).await.unwrap();
        service.add_item("u1", &tee.id, 2, Some("M")).await.unwrap();

        db.products().delete(&mug.id).await.unwrap();

        let view = service.get_cart("u1").await.unwrap();
        assert_eq!(view.item_count, 1);
        assert_eq!(view.cart.items[0].product_id, tee.id);
        assert_eq!(view.cart.total_price, Money::from_cents(3000 + 100 + 200));

        let stored = db.carts().get_by_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_remove_items() {
        let (db, service) = setup(ShopConfig::default()).await;
        let mug = flat(&db, 1000, 10).await;

        let view = service.add_item("u1", &mug.id, 1, None).await.unwrap();
        let item_id = view.cart.items[0].id.clone();

        let view = service.update_item_quantity("u1", &item_id, 7).await.unwrap();
        assert_eq!(view.cart.items[0].quantity, 7);
        assert_eq!(view.cart.total_price, Money::from_cents(7000));

        let err = service.update_item_quantity("u1", &item_id, 11).await.unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientStock { available: 10, .. }));

        let err = service.update_item_quantity("u1", "nope", 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let view = service.remove_item("u1", &item_id).await.unwrap();
        assert_eq!(view.item_count, 0);
        assert!(view.cart.total_price.is_zero());

        let err = service.remove_item("u1", &item_id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_cart() {
        let (_db, service) = setup(ShopConfig::default()).await;
        assert!(matches!(service.get_cart("ghost").await, Err(ServiceError::NotFound(_))));
        assert!(matches!(
            service.update_item_quantity("ghost", "x", 1).await,
            Err(ServiceError::NotFound(_))
        ));
        service.clear_cart("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_cart() {
        let (db, service) = setup(ShopConfig::default()).await;
        let mug = flat(&db, 1000, 10).await;
        service.add_item("u1", &mug.id, 1, None).await.unwrap();

        service.clear_cart("u1").await.unwrap();
        assert!(db.carts().get_by_user("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_apply_coupon() {
        let (db, service) = setup(ShopConfig::default()).await;
        let mug = flat(&db, 5000, 10).await;
        let now = Utc::now();
        db.coupons()
            .insert(&Coupon::new("SAVE10", now + Duration::days(1), DiscountRate::from_percent(10)).unwrap())
            .await
            .unwrap();
        db.coupons()
            .insert(&Coupon::new("OLD", now - Duration::days(1), DiscountRate::from_percent(50)).unwrap())
            .await
            .unwrap();

        // Coupon lookup happens before the cart lookup
        let err = service.apply_coupon("u1", "save10").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        service.add_item("u1", &mug.id, 2, None).await.unwrap();

        let err = service.apply_coupon("u1", "OLD").await.unwrap_err();
        assert_eq!(err.to_string(), "Coupon is invalid or has expired");
        let err = service.apply_coupon("u1", "NOPE").await.unwrap_err();
        assert_eq!(err.to_string(), "Coupon is invalid or has expired");

        let view = service.apply_coupon("u1", " save10 ").await.unwrap();
        assert_eq!(view.cart.total_price, Money::from_cents(10000));
        assert_eq!(view.cart.total_price_after_discount, Some(Money::from_cents(9000)));
        assert_eq!(view.cart.coupon.as_ref().unwrap().name, "SAVE10");

        // The discount follows later mutations
        let view = service.add_item("u1", &mug.id, 1, None).await.unwrap();
        assert_eq!(view.cart.total_price_after_discount, Some(Money::from_cents(4500)));

        // and disappears with the last line
        let item_id = view.cart.items[0].id.clone();
        let view = service.remove_item("u1", &item_id).await.unwrap();
        assert!(view.cart.coupon.is_none());
        assert!(view.cart.total_price_after_discount.is_none());
    }

    #[tokio::test]
    async fn test_expired_coupon_is_kept_unless_revalidated() {
        for (revalidate, kept) in [(false, true), (true, false)] {
            let config = ShopConfig {
                revalidate_coupon_expiry: revalidate,
                ..ShopConfig::default()
            };
            let (db, service) = setup(config).await;
            let mug = flat(&db, 1000, 10).await;
            let coupon = Coupon::new(
                "BRIEF",
                Utc::now() + Duration::days(1),
                DiscountRate::from_percent(20),
            )
            .unwrap();
            db.coupons().insert(&coupon).await.unwrap();

            service.add_item("u1", &mug.id, 1, None).await.unwrap();
            service.apply_coupon("u1", "BRIEF").await.unwrap();

            // The coupon vanishes from the catalog after it was applied
            db.coupons().delete(&coupon.id).await.unwrap();

            let view = service.get_cart("u1").await.unwrap();
            assert_eq!(view.cart.coupon.is_some(), kept, "revalidate = {revalidate}");
            assert_eq!(view.cart.total_price_after_discount.is_some(), kept);
        }
    }

    #[tokio::test]
    async fn test_reads_reprice_from_live_product() {
        let (db, service) = setup(ShopConfig::default()).await;
        let mut mug = flat(&db, 1000, 10).await;
        service.add_item("u1", &mug.id, 2, None).await.unwrap();

        mug.pricing = ProductPricing::Flat {
            price: Money::from_cents(1200),
            quantity: 10,
            price_after_discount: Some(Money::from_cents(900)),
        };
        mug.color = Some("blue".to_string());
        db.products().update(&mug).await.unwrap();

        let view = service.get_cart("u1").await.unwrap();
        let line = &view.cart.items[0];
        assert_eq!(line.price, Money::from_cents(900));
        assert_eq!(line.color.as_deref(), Some("blue"));
        assert_eq!(view.cart.total_price, Money::from_cents(1800));

        let stored = db.carts().get_by_user("u1").await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.items[0].price, Money::from_cents(900));
    }

    #[tokio::test]
    async fn test_unchanged_reads_leave_version_alone() {
        let (db, service) = setup(ShopConfig::default()).await;
        set_settings(&db, 100, 400).await;
        let mug = flat(&db, 1000, 10).await;
        service.add_item("u1", &mug.id, 2, None).await.unwrap();

        let mut loaded = db.carts().get_by_user("u1").await.unwrap().unwrap();
        assert_eq!(loaded.version, 1);

        let first = service.get_cart("u1").await.unwrap();
        let second = service.get_cart("u1").await.unwrap();
        assert_eq!(first.cart.version, 1);
        assert_eq!(second.cart, first.cart);

        // A writer that loaded before the reads still wins its update
        loaded.items[0].quantity = 3;
        db.carts().save(&mut loaded).await.unwrap();
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_stale_writer_gets_conflict() {
        let (db, service) = setup(ShopConfig::default()).await;
        let mug = flat(&db, 1000, 10).await;
        service.add_item("u1", &mug.id, 1, None).await.unwrap();

        let mut stale = db.carts().get_by_user("u1").await.unwrap().unwrap();
        service.add_item("u1", &mug.id, 2, None).await.unwrap();

        let err = ServiceError::from(db.carts().save(&mut stale).await.unwrap_err());
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(err.http_status(), 409);
    }
}
