//! # Repository Module
//!
//! Database repository implementations for Bazaar.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  bazaar-service                                                        │
//! │       │                                                                 │
//! │       │  db.carts().get_by_user("u1")                                  │
//! │       ▼                                                                 │
//! │  CartRepository                                                        │
//! │  ├── get_by_user / get_by_id                                           │
//! │  ├── save (insert or compare-and-swap on version)                      │
//! │  └── delete / delete_by_user                                           │
//! │       │                                                                 │
//! │       │  SQL (runtime-checked sqlx queries)                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Rows are decoded into private `*Row` structs and converted into       │
//! │  bazaar-core types at the repository boundary.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Products and their size variants
//! - [`cart::CartRepository`] - Per-user carts with optimistic versioning
//! - [`coupon::CouponRepository`] - Coupon codes
//! - [`settings::SettingsRepository`] - The app settings singleton
//! - [`order::OrderRepository`] - Orders and the checkout transaction

pub mod cart;
pub mod coupon;
pub mod order;
pub mod product;
pub mod settings;
