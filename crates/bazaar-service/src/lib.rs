//! # bazaar-service: Cart and Checkout Operations
//!
//! The operations an HTTP host exposes to shoppers and admins, built on
//! the pure rules in `bazaar-core` and the storage in `bazaar-db`.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartService                         OrderService                       │
//! │  ───────────                         ────────────                       │
//! │  get_cart                            create_cash_order                  │
//! │  add_item                            create_checkout_session            │
//! │  update_item_quantity                complete_checkout_session          │
//! │  remove_item                         get_order / list_orders            │
//! │  clear_cart                          mark_order_paid                    │
//! │  apply_coupon                        mark_order_delivered               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bazaar_db::Database;
//! use bazaar_service::{init_tracing, CartService, OrderService, ShopConfig};
//!
//! init_tracing();
//! let config = ShopConfig::from_env()?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let carts = CartService::new(db.clone(), &config);
//! let orders = OrderService::new(db, Arc::new(my_gateway), &config);
//!
//! let view = carts.add_item("user-1", "product-1", 2, None).await?;
//! ```

pub mod cart_service;
pub mod config;
pub mod error;
pub mod order_service;
pub mod payment;

pub use cart_service::{CartService, CartView};
pub use config::{ConfigError, ShopConfig};
pub use error::{ErrorBody, ErrorCode, ServiceError, ServiceResult};
pub use order_service::OrderService;
pub use payment::{CompletedSession, PaymentError, PaymentGateway, SessionHandle, SessionRequest};

use tracing_subscriber::EnvFilter;

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=bazaar=trace` - Show trace for bazaar crates only
/// - Default: `info,bazaar=debug,sqlx=warn`
///
/// Calling it again after a subscriber is installed does nothing.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bazaar=debug,sqlx=warn"));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
