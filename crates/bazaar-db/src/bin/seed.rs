//! # Seed Data Generator
//!
//! Populates a database with a small demo catalog for development.
//!
//! ## Usage
//! ```bash
//! # Seed ./bazaar.db
//! cargo run -p bazaar-db --bin seed
//!
//! # Specify database path
//! cargo run -p bazaar-db --bin seed -- --db ./data/bazaar.db
//! ```
//!
//! ## Generated Data
//! - Flat products (one price, one stock counter), a few on sale
//! - Sized apparel, including sold-out sizes
//! - Coupon `WELCOME10` (10% off, valid for 30 days)
//! - Settings: 1.50 tax, 5.00 shipping

use std::env;

use bazaar_core::{
    AppSettings, Coupon, DiscountRate, Money, Product, ProductPricing, SizeVariant,
};
use bazaar_db::{Database, DbConfig, DbError};
use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// (title, color, price in cents, stock, sale price in cents)
const FLAT_PRODUCTS: &[(&str, Option<&str>, i64, i64, Option<i64>)] = &[
    ("Ceramic Mug", Some("white"), 1000, 40, None),
    ("Travel Tumbler", Some("black"), 2499, 15, Some(1999)),
    ("Notebook A5", None, 650, 120, None),
    ("Canvas Tote", Some("natural"), 1800, 0, None),
    ("Enamel Pin", Some("gold"), 450, 300, Some(399)),
];

/// (title, color, [(size, stock, price in cents)])
const SIZED_PRODUCTS: &[(&str, Option<&str>, &[(&str, i64, i64)])] = &[
    (
        "Logo Tee",
        Some("navy"),
        &[("S", 0, 1500), ("M", 5, 1500), ("L", 12, 1500), ("XL", 3, 1700)],
    ),
    (
        "Hoodie",
        Some("grey"),
        &[("M", 8, 4200), ("L", 6, 4200), ("XXL", 2, 4600)],
    ),
    ("Beanie", None, &[("OS", 25, 1200)]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,bazaar=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./bazaar.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bazaar Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./bazaar.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, "Seeding database");
    let db = Database::new(DbConfig::new(&db_path)).await?;

    let products = db.products();
    for (title, color, price, stock, sale) in FLAT_PRODUCTS {
        let pricing = match sale {
            Some(sale) => ProductPricing::Flat {
                price: Money::from_cents(*price),
                quantity: *stock,
                price_after_discount: Some(Money::from_cents(*sale)),
            },
            None => ProductPricing::flat(Money::from_cents(*price), *stock),
        };
        let product = Product::new(title, *color, pricing)?;
        products.insert(&product).await?;
        info!(id = %product.id, title, "Flat product created");
    }

    for (title, color, sizes) in SIZED_PRODUCTS {
        let variants = sizes
            .iter()
            .map(|(size, stock, price)| SizeVariant::new(size, *stock, Money::from_cents(*price)))
            .collect();
        let product = Product::new(title, *color, ProductPricing::sized(variants))?;
        products.insert(&product).await?;
        info!(id = %product.id, title, sizes = sizes.len(), "Sized product created");
    }

    let coupon = Coupon::new(
        "WELCOME10",
        Utc::now() + Duration::days(30),
        DiscountRate::from_percent(10),
    )?;
    match db.coupons().insert(&coupon).await {
        Ok(_) => info!(code = %coupon.code, expire = %coupon.expire, "Coupon created"),
        Err(DbError::UniqueViolation { .. }) => warn!(code = %coupon.code, "Coupon already exists"),
        Err(e) => return Err(e.into()),
    }

    db.settings()
        .update(&AppSettings {
            tax_price: Money::from_cents(150),
            shipping_price: Money::from_cents(500),
        })
        .await?;

    info!(products = products.count().await?, "Seeding complete");
    db.close().await;
    Ok(())
}
