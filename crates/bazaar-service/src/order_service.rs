//! # Order Service
//!
//! Checkout (cash and card) and the admin order operations.
//!
//! ## Checkout Attempt
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Fetching      load cart by id (must belong to the user)                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Validating    before = items; reconcile; after = items                 │
//! │     │                                                                   │
//! │     ├── before != after ──► price, save corrected cart ──► StaleCart    │
//! │     ├── no lines ─────────────────────────────────────────► InvalidOrder│
//! │     ▼                                                                   │
//! │  Committing    cash: snapshot order, commit_checkout (one transaction)  │
//! │                card: open provider session, return its handle           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  Done                                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A paid card session comes back through [`OrderService::complete_checkout_session`],
//! which commits the order through the same transaction. Replays of the
//! same provider event return the order already created for it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cart_service::refresh_cart;
use crate::config::ShopConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::payment::{PaymentGateway, SessionHandle, SessionRequest};
use bazaar_core::pricing::recompute_totals;
use bazaar_core::validation::validate_shipping_address;
use bazaar_core::{Cart, CoreError, Order, PaymentMethodType, ShippingAddress};
use bazaar_db::{Database, DbError};

/// Checkout and order operations.
#[derive(Clone)]
pub struct OrderService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    success_url: String,
    cancel_url: String,
    revalidate_coupon_expiry: bool,
}

impl OrderService {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, config: &ShopConfig) -> Self {
        OrderService {
            db,
            gateway,
            currency: config.currency.clone(),
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
            revalidate_coupon_expiry: config.revalidate_coupon_expiry,
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Turns the user's cart into an unpaid cash-on-delivery order.
    ///
    /// ## Errors
    /// * `NotFound` - no such cart for this user
    /// * `StaleCart` - the cart drifted; the corrected cart was saved
    /// * `InvalidOrder` - the cart has no lines
    /// * `InsufficientStock` - stock ran out between reconciliation and commit
    /// * `Conflict` - the cart changed concurrently
    pub async fn create_cash_order(
        &self,
        user_id: &str,
        cart_id: &str,
        shipping_address: ShippingAddress,
    ) -> ServiceResult<Order> {
        let cart = self.validated_cart(user_id, cart_id).await?;

        let order = Order::from_cart(
            &cart,
            shipping_address,
            PaymentMethodType::Cash,
            Utc::now(),
        )?;
        self.db.orders().commit_checkout(&order, &cart).await?;
        Ok(order)
    }

    /// Opens a hosted card payment for the user's cart.
    ///
    /// The validated cart is saved before the session is opened, so the
    /// stored totals match the amount the provider charges.
    pub async fn create_checkout_session(
        &self,
        user_id: &str,
        cart_id: &str,
        shipping_address: ShippingAddress,
    ) -> ServiceResult<SessionHandle> {
        validate_shipping_address(&shipping_address).map_err(CoreError::from)?;

        let mut cart = self.validated_cart(user_id, cart_id).await?;
        self.db.carts().save(&mut cart).await?;

        let request = SessionRequest {
            cart_id: cart.id.clone(),
            cart_version: cart.version,
            user_id: cart.user_id.clone(),
            amount_minor: cart.amount_due().cents(),
            currency: self.currency.clone(),
            success_url: self.success_url.clone(),
            cancel_url: self.cancel_url.clone(),
            shipping_address,
        };

        let handle = self.gateway.create_session(request).await?;
        info!(
            cart_id = %cart.id,
            session_id = %handle.session_id,
            amount = %cart.amount_due(),
            "Checkout session created"
        );
        Ok(handle)
    }

    /// Handles the provider's "checkout completed" webhook.
    ///
    /// The order is built from the stored cart the session was opened for,
    /// already paid by card. If the cart was saved again after the session
    /// opened, or its amount due no longer matches the charge, the order is
    /// committed unpaid with the session as its payment reference so an
    /// admin can settle it. A replayed event returns the existing order.
    pub async fn complete_checkout_session(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> ServiceResult<Order> {
        let session = self.gateway.verify_webhook(payload, signature).await?;
        debug!(session_id = %session.session_id, cart_id = %session.cart_id, "Webhook verified");

        if let Some(existing) = self
            .db
            .orders()
            .get_by_payment_reference(&session.session_id)
            .await?
        {
            info!(session_id = %session.session_id, order_id = %existing.id, "Replayed webhook");
            return Ok(existing);
        }

        let cart = self
            .db
            .carts()
            .get_by_id(&session.cart_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart not found: {}", session.cart_id)))?;

        let now = Utc::now();
        let mut order =
            Order::from_cart(&cart, session.shipping_address, PaymentMethodType::Card, now)?
                .paid_by_card(&session.session_id, now);

        if cart.version != session.cart_version || cart.amount_due().cents() != session.amount_minor
        {
            warn!(
                cart_id = %cart.id,
                cart_version = cart.version,
                session_version = session.cart_version,
                cart_amount = cart.amount_due().cents(),
                charged = session.amount_minor,
                "Cart changed after the session opened; order left unpaid for review"
            );
            order.set_paid(false, now);
        }

        match self.db.orders().commit_checkout(&order, &cart).await {
            Ok(()) => Ok(order),
            Err(DbError::UniqueViolation { .. }) => {
                // A concurrent delivery of the same event won the insert
                self.db
                    .orders()
                    .get_by_payment_reference(&session.session_id)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Order for session {}", session.session_id))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn get_order(&self, order_id: &str) -> ServiceResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order not found: {order_id}")))
    }

    /// The user's orders, newest first.
    pub async fn list_orders(&self, user_id: &str) -> ServiceResult<Vec<Order>> {
        Ok(self.db.orders().list_for_user(user_id).await?)
    }

    /// Admin override of the paid flag.
    pub async fn mark_order_paid(&self, order_id: &str, paid: bool) -> ServiceResult<Order> {
        Ok(self.db.orders().set_paid(order_id, paid, Utc::now()).await?)
    }

    /// Admin override of the delivered flag.
    pub async fn mark_order_delivered(
        &self,
        order_id: &str,
        delivered: bool,
    ) -> ServiceResult<Order> {
        Ok(self
            .db
            .orders()
            .set_delivered(order_id, delivered, Utc::now())
            .await?)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Fetching and Validating: the reconciled, priced cart, or the reason
    /// checkout cannot go ahead.
    async fn validated_cart(&self, user_id: &str, cart_id: &str) -> ServiceResult<Cart> {
        let mut cart = self
            .db
            .carts()
            .get_by_id(cart_id)
            .await?
            .filter(|cart| cart.user_id == user_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Cart not found: {cart_id}")))?;

        let before = cart.items.clone();
        let (_, report) =
            refresh_cart(&self.db, &mut cart, self.revalidate_coupon_expiry, Utc::now()).await?;

        let settings = self.db.settings().get().await?;
        recompute_totals(&mut cart, &settings);

        if cart.items != before {
            warn!(
                cart_id = %cart.id,
                removed = report.removed.len(),
                repriced = report.repriced.len(),
                recolored = report.recolored.len(),
                "Cart drifted at checkout"
            );
            self.db.carts().save(&mut cart).await?;
            return Err(ServiceError::StaleCart);
        }

        if cart.is_empty() {
            return Err(CoreError::EmptyOrder.into());
        }

        Ok(cart)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart_service::CartService;
    use crate::payment::{CompletedSession, MockPaymentGateway, PaymentError};
    use bazaar_core::{AppSettings, Money, Product, ProductPricing, ProductRecord, SizeVariant};
    use bazaar_db::DbConfig;

    struct Shop {
        db: Database,
        carts: CartService,
        mug: Product,
        tee: Product,
    }

    async fn shop() -> Shop {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.settings()
            .create(&AppSettings {
                tax_price: Money::from_cents(100),
                shipping_price: Money::from_cents(400),
            })
            .await
            .unwrap();

        let mug = Product::new("Mug", Some("red"), ProductPricing::flat(Money::from_cents(1000), 10))
            .unwrap();
        let tee = Product::new(
            "Tee",
            None,
            ProductPricing::sized(vec![SizeVariant::new("M", 5, Money::from_cents(1500))]),
        )
        .unwrap();
        db.products().insert(&mug).await.unwrap();
        db.products().insert(&tee).await.unwrap();

        let carts = CartService::new(db.clone(), &ShopConfig::default());
        Shop { db, carts, mug, tee }
    }

    fn service(db: &Database, gateway: MockPaymentGateway) -> OrderService {
        OrderService::new(db.clone(), Arc::new(gateway), &ShopConfig::default())
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            details: Some("1 High St".to_string()),
            phone: Some("555-0100".to_string()),
            city: Some("Leeds".to_string()),
            postal_code: Some("LS1".to_string()),
        }
    }

    async fn filled_cart(shop: &Shop) -> Cart {
        shop.carts.add_item("u1", &shop.mug.id, 2, None).await.unwrap();
        shop.carts
            .add_item("u1", &shop.tee.id, 3, Some("M"))
            .await
            .unwrap()
            .cart
    }

    #[tokio::test]
    async fn test_cash_order_commits_everything() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;
        let orders = service(&shop.db, MockPaymentGateway::new());

        let order = orders.create_cash_order("u1", &cart.id, address()).await.unwrap();
        assert_eq!(order.payment_method, PaymentMethodType::Cash);
        assert!(!order.is_paid);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total_price, Money::from_cents(2000 + 4500 + 100 + 400));

        assert!(shop.db.carts().get_by_user("u1").await.unwrap().is_none());

        let mug = shop.db.products().get_by_id(&shop.mug.id).await.unwrap().unwrap();
        assert_eq!((mug.quantity, mug.sold), (Some(8), 2));
        let tee = shop.db.products().get_by_id(&shop.tee.id).await.unwrap().unwrap();
        assert_eq!(tee.sizes[0].quantity, 2);
        assert_eq!(tee.sold, 3);

        let stored = orders.get_order(&order.id).await.unwrap();
        assert_eq!(stored.items, order.items);
        assert_eq!(stored.total_price, order.total_price);
        assert_eq!(orders.list_orders("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lowercase_imported_size_checks_out() {
        let shop = shop().await;
        let mut record = ProductRecord::from(
            Product::new(
                "Cap",
                None,
                ProductPricing::sized(vec![SizeVariant::new("M", 5, Money::from_cents(800))]),
            )
            .unwrap(),
        );
        record.sizes[0].size = "m".to_string();
        shop.db.products().insert_record(&record).await.unwrap();

        let view = shop.carts.add_item("u1", &record.id, 1, Some("m")).await.unwrap();
        assert_eq!(view.cart.items[0].size.as_deref(), Some("M"));

        let orders = service(&shop.db, MockPaymentGateway::new());
        orders.create_cash_order("u1", &view.cart.id, address()).await.unwrap();

        let cap = shop.db.products().get_by_id(&record.id).await.unwrap().unwrap();
        assert_eq!(cap.sizes[0].quantity, 4);
        assert_eq!(cap.sold, 1);
    }

    #[tokio::test]
    async fn test_price_change_aborts_then_retry_succeeds() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;
        let orders = service(&shop.db, MockPaymentGateway::new());

        let mut mug = shop.mug.clone();
        mug.pricing = ProductPricing::flat(Money::from_cents(1250), 10);
        shop.db.products().update(&mug).await.unwrap();

        let err = orders.create_cash_order("u1", &cart.id, address()).await.unwrap_err();
        assert!(matches!(err, ServiceError::StaleCart));
        assert_eq!(err.http_status(), 409);

        let corrected = shop.db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        let line = corrected.items.iter().find(|i| i.product_id == mug.id).unwrap();
        assert_eq!(line.price, Money::from_cents(1250));
        assert_eq!(corrected.total_price, Money::from_cents(2500 + 4500 + 100 + 400));

        let order = orders.create_cash_order("u1", &cart.id, address()).await.unwrap();
        assert_eq!(order.total_price, corrected.total_price);
    }

    #[tokio::test]
    async fn test_empty_and_foreign_carts() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;
        let orders = service(&shop.db, MockPaymentGateway::new());

        let err = orders.create_cash_order("intruder", &cart.id, address()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        for item in &cart.items {
            shop.carts.remove_item("u1", &item.id).await.unwrap();
        }
        let err = orders.create_cash_order("u1", &cart.id, address()).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrder(_)));
    }

    #[tokio::test]
    async fn test_deleted_product_makes_cart_stale() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;
        let orders = service(&shop.db, MockPaymentGateway::new());

        shop.db.products().delete(&shop.tee.id).await.unwrap();

        let err = orders.create_cash_order("u1", &cart.id, address()).await.unwrap_err();
        assert!(matches!(err, ServiceError::StaleCart));

        let corrected = shop.db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(corrected.items.len(), 1);
        assert_eq!(corrected.total_price, Money::from_cents(2000 + 100 + 400));
    }

    #[tokio::test]
    async fn test_checkout_session_sends_amount_due() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;
        let cart_id = cart.id.clone();
        let saved_version = cart.version + 1;

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_session()
            .withf(move |req| {
                req.cart_id == cart_id
                    && req.cart_version == saved_version
                    && req.amount_minor == 7000
                    && req.currency == "usd"
            })
            .times(1)
            .returning(|_| {
                Ok(SessionHandle {
                    session_id: "cs_1".to_string(),
                    url: "https://pay.example/cs_1".to_string(),
                })
            });

        let orders = service(&shop.db, gateway);
        let handle = orders
            .create_checkout_session("u1", &cart.id, address())
            .await
            .unwrap();
        assert_eq!(handle.session_id, "cs_1");

        // Cart stays until the payment completes
        let stored = shop.db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(stored.version, saved_version);
    }

    #[tokio::test]
    async fn test_checkout_session_rejects_drift_without_calling_provider() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;
        shop.db.products().delete(&shop.mug.id).await.unwrap();

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_session().never();

        let orders = service(&shop.db, gateway);
        let err = orders
            .create_checkout_session("u1", &cart.id, address())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::StaleCart));
    }

    #[tokio::test]
    async fn test_webhook_creates_paid_order_once() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;
        let cart_id = cart.id.clone();
        let cart_version = cart.version;

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook()
            .withf(|payload, signature| payload == b"event" && signature == "sig")
            .times(2)
            .returning(move |_, _| {
                Ok(CompletedSession {
                    session_id: "cs_9".to_string(),
                    cart_id: cart_id.clone(),
                    cart_version,
                    amount_minor: 7000,
                    shipping_address: address(),
                })
            });

        let orders = service(&shop.db, gateway);
        let order = orders.complete_checkout_session(b"event", "sig").await.unwrap();
        assert_eq!(order.payment_method, PaymentMethodType::Card);
        assert!(order.is_paid);
        assert!(order.paid_at.is_some());
        assert_eq!(order.payment_reference.as_deref(), Some("cs_9"));
        assert_eq!(order.shipping_address, address());
        assert!(shop.db.carts().get_by_id(&cart.id).await.unwrap().is_none());

        let replay = orders.complete_checkout_session(b"event", "sig").await.unwrap();
        assert_eq!(replay.id, order.id);
        assert_eq!(orders.list_orders("u1").await.unwrap().len(), 1);
    }

    fn completing(session_id: &str, cart: &Cart, amount_minor: i64) -> MockPaymentGateway {
        let session = CompletedSession {
            session_id: session_id.to_string(),
            cart_id: cart.id.clone(),
            cart_version: cart.version,
            amount_minor,
            shipping_address: address(),
        };
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook()
            .returning(move |_, _| Ok(session.clone()));
        gateway
    }

    #[tokio::test]
    async fn test_cart_edited_after_session_gives_unpaid_order() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_session().times(1).returning(|_| {
            Ok(SessionHandle {
                session_id: "cs_2".to_string(),
                url: "https://pay.example/cs_2".to_string(),
            })
        });
        service(&shop.db, gateway)
            .create_checkout_session("u1", &cart.id, address())
            .await
            .unwrap();
        let at_session = shop.db.carts().get_by_id(&cart.id).await.unwrap().unwrap();
        assert_eq!(at_session.amount_due(), Money::from_cents(7000));

        // Shopper grows the cart in another tab while paying 7000
        shop.carts.add_item("u1", &shop.mug.id, 9, None).await.unwrap();

        let orders = service(&shop.db, completing("cs_2", &at_session, 7000));
        let order = orders.complete_checkout_session(b"event", "sig").await.unwrap();
        assert_eq!(order.amount_due(), Money::from_cents(9000 + 4500 + 100 + 400));
        assert!(!order.is_paid);
        assert!(order.paid_at.is_none());
        assert_eq!(order.payment_method, PaymentMethodType::Card);
        assert_eq!(order.payment_reference.as_deref(), Some("cs_2"));

        let stored = orders.get_order(&order.id).await.unwrap();
        assert!(!stored.is_paid);
    }

    #[tokio::test]
    async fn test_resaved_cart_with_same_total_gives_unpaid_order() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;

        // Same amount, different version: the lines may have been swapped
        let mut resaved = cart.clone();
        shop.db.carts().save(&mut resaved).await.unwrap();
        assert_eq!(resaved.amount_due(), cart.amount_due());

        let orders = service(&shop.db, completing("cs_3", &cart, 7000));
        let order = orders.complete_checkout_session(b"event", "sig").await.unwrap();
        assert!(!order.is_paid);
        assert_eq!(order.payment_reference.as_deref(), Some("cs_3"));
    }

    #[tokio::test]
    async fn test_webhook_with_bad_signature() {
        let shop = shop().await;
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_webhook()
            .returning(|_, _| Err(PaymentError::InvalidSignature));

        let orders = service(&shop.db, gateway);
        let err = orders.complete_checkout_session(b"x", "bad").await.unwrap_err();
        assert!(matches!(err, ServiceError::Payment(PaymentError::InvalidSignature)));
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn test_status_flags() {
        let shop = shop().await;
        let cart = filled_cart(&shop).await;
        let orders = service(&shop.db, MockPaymentGateway::new());
        let order = orders.create_cash_order("u1", &cart.id, address()).await.unwrap();

        let paid = orders.mark_order_paid(&order.id, true).await.unwrap();
        assert!(paid.is_paid && paid.paid_at.is_some());

        let delivered = orders.mark_order_delivered(&order.id, true).await.unwrap();
        assert!(delivered.is_delivered && delivered.delivered_at.is_some());

        let undelivered = orders.mark_order_delivered(&order.id, false).await.unwrap();
        assert!(!undelivered.is_delivered && undelivered.delivered_at.is_none());
        assert!(undelivered.is_paid);

        assert!(matches!(
            orders.mark_order_paid("missing", true).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(orders.get_order("missing").await, Err(ServiceError::NotFound(_))));
    }
}
