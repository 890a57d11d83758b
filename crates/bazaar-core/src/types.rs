//! # Domain Types
//!
//! Catalog and checkout types shared by every layer of Bazaar.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐  │
//! │  │    Product      │   │   ProductPricing     │   │  SizeVariant    │  │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ─────────────  │  │
//! │  │  id (UUID)      │──►│  Flat { price, qty } │   │  size "M"       │  │
//! │  │  title, color   │   │  Sized { variants } ─┼──►│  quantity       │  │
//! │  │  sold           │   └──────────────────────┘   │  price          │  │
//! │  └─────────────────┘                              └─────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌───────────────────┐     │
//! │  │  DiscountRate   │   │  AppSettings    │   │ PaymentMethodType │     │
//! │  │  ─────────────  │   │  ─────────────  │   │  ───────────────  │     │
//! │  │  bps (u32)      │   │  tax_price      │   │  Card             │     │
//! │  │  1000 = 10%     │   │  shipping_price │   │  Cash             │     │
//! │  └─────────────────┘   └─────────────────┘   └───────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Product Shapes
//! A product is sold either as one flat SKU or only in discrete sizes.
//! Storage keeps the raw columns ([`ProductRecord`]); everything past the
//! repository works with the classified [`Product`], so "both" and
//! "neither" shapes cannot reach the cart logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{
    validate_price_cents, validate_product_title, validate_sizes, validate_stock,
};

// =============================================================================
// Discount Rate
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1000 bps = 10%, 1250 bps = 12.5%
///
/// Coupons are entered as whole or fractional percents; storing bps keeps
/// every discount calculation in integer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a rate from a whole percent (10 → 10%).
    #[inline]
    pub const fn from_percent(percent: u32) -> Self {
        DiscountRate(percent * 100)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }
}

// =============================================================================
// Size Variant
// =============================================================================

/// One discrete size of a sized product, independently priced and stocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SizeVariant {
    /// Size label, stored uppercase ("S", "XL", "42").
    pub size: String,

    /// Units in stock for this size.
    pub quantity: i64,

    /// List price of this size.
    pub price: Money,

    /// Sale price, when the size is discounted.
    pub price_after_discount: Option<Money>,
}

impl SizeVariant {
    /// Creates a variant, normalizing the size label to uppercase.
    pub fn new(size: &str, quantity: i64, price: Money) -> Self {
        SizeVariant {
            size: normalize_size(size),
            quantity,
            price,
            price_after_discount: None,
        }
    }

    /// Sets a sale price on the variant.
    pub fn with_discount(mut self, price_after_discount: Money) -> Self {
        self.price_after_discount = Some(price_after_discount);
        self
    }

    /// The price a shopper pays for one unit: sale price when set.
    #[inline]
    pub fn unit_price(&self) -> Money {
        self.price_after_discount.unwrap_or(self.price)
    }

    /// Case-insensitive size comparison.
    #[inline]
    pub fn matches(&self, size: &str) -> bool {
        self.size.eq_ignore_ascii_case(size.trim())
    }
}

/// Normalizes a size label: trimmed and uppercased.
pub fn normalize_size(size: &str) -> String {
    size.trim().to_uppercase()
}

// =============================================================================
// Product Pricing
// =============================================================================

/// How a product is priced and stocked.
///
/// ## Shape Rules
/// ```text
/// price  quantity  sizes      →  shape
/// ─────  ────────  ─────────     ──────────────
///  set     set     empty      →  Flat
///  none    none    non-empty  →  Sized
///  anything else              →  InvalidState (not purchasable)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ProductPricing {
    /// A single SKU with one price and one stock counter.
    Flat {
        price: Money,
        quantity: i64,
        price_after_discount: Option<Money>,
    },
    /// Sold only in the listed sizes.
    Sized { variants: Vec<SizeVariant> },
}

impl ProductPricing {
    /// Flat pricing without a sale price.
    pub fn flat(price: Money, quantity: i64) -> Self {
        ProductPricing::Flat {
            price,
            quantity,
            price_after_discount: None,
        }
    }

    /// Sized pricing from a list of variants.
    pub fn sized(variants: Vec<SizeVariant>) -> Self {
        ProductPricing::Sized { variants }
    }

    /// Classifies raw product columns into one of the two legal shapes.
    ///
    /// ## When This Fails
    /// - top-level price/quantity AND sizes are both present
    /// - neither a complete price/quantity pair nor sizes are present
    pub fn classify(
        product_id: &str,
        price: Option<Money>,
        quantity: Option<i64>,
        price_after_discount: Option<Money>,
        sizes: Vec<SizeVariant>,
    ) -> CoreResult<Self> {
        match (price, quantity, sizes.is_empty()) {
            (Some(price), Some(quantity), true) => Ok(ProductPricing::Flat {
                price,
                quantity,
                price_after_discount,
            }),
            (None, None, false) => Ok(ProductPricing::Sized { variants: sizes }),
            _ => Err(CoreError::InvalidState {
                product_id: product_id.to_string(),
            }),
        }
    }

    /// True for sized products.
    #[inline]
    pub fn is_sized(&self) -> bool {
        matches!(self, ProductPricing::Sized { .. })
    }

    /// Finds the variant for `size` (case-insensitive). Always `None` for
    /// flat products.
    pub fn find_variant(&self, size: &str) -> Option<&SizeVariant> {
        match self {
            ProductPricing::Flat { .. } => None,
            ProductPricing::Sized { variants } => variants.iter().find(|v| v.matches(size)),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A purchasable product in one of the two legal pricing shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display title.
    pub title: String,

    /// Optional colour, copied onto cart lines.
    pub color: Option<String>,

    /// Units sold across all orders.
    pub sold: i64,

    /// Price and stock shape.
    pub pricing: ProductPricing,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a new product after validating title, stock and sizes.
    pub fn new(title: &str, color: Option<&str>, pricing: ProductPricing) -> CoreResult<Self> {
        validate_product_title(title)?;
        validate_pricing(&pricing)?;

        let now = Utc::now();
        Ok(Product {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.trim().to_string(),
            color: color.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            sold: 0,
            pricing,
            created_at: now,
            updated_at: now,
        })
    }

    /// The price a cart line for `size` should carry right now.
    ///
    /// `None` when the shape and the size disagree (a size on a flat
    /// product, no size on a sized product, or a size that no longer
    /// exists).
    pub fn effective_price(&self, size: Option<&str>) -> Option<Money> {
        match (&self.pricing, size) {
            (
                ProductPricing::Flat {
                    price,
                    price_after_discount,
                    ..
                },
                None,
            ) => Some(price_after_discount.unwrap_or(*price)),
            (ProductPricing::Sized { .. }, Some(size)) => {
                self.pricing.find_variant(size).map(SizeVariant::unit_price)
            }
            _ => None,
        }
    }
}

/// Validates a pricing shape before it is written.
pub fn validate_pricing(pricing: &ProductPricing) -> CoreResult<()> {
    match pricing {
        ProductPricing::Flat {
            price,
            quantity,
            price_after_discount,
        } => {
            validate_stock(*quantity)?;
            validate_price("price", *price)?;
            if let Some(discounted) = price_after_discount {
                validate_price("price_after_discount", *discounted)?;
            }
        }
        ProductPricing::Sized { variants } => {
            validate_sizes(variants)?;
            for variant in variants {
                validate_stock(variant.quantity)?;
                validate_price("price", variant.price)?;
                if let Some(discounted) = variant.price_after_discount {
                    validate_price("price_after_discount", discounted)?;
                }
            }
        }
    }
    Ok(())
}

fn validate_price(field: &str, price: Money) -> CoreResult<()> {
    validate_price_cents(price.cents()).map_err(|_| {
        ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        }
        .into()
    })
}

// =============================================================================
// Product Record
// =============================================================================

/// A product exactly as stored, before shape classification.
///
/// Imports and legacy rows can hold shapes the storefront cannot sell; the
/// record keeps them loadable so an admin can still see and fix them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductRecord {
    pub id: String,
    pub title: String,
    pub color: Option<String>,
    pub price: Option<Money>,
    pub quantity: Option<i64>,
    pub price_after_discount: Option<Money>,
    pub sizes: Vec<SizeVariant>,
    pub sold: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Classifies the record into a sellable [`Product`].
    pub fn into_product(self) -> CoreResult<Product> {
        let pricing = ProductPricing::classify(
            &self.id,
            self.price,
            self.quantity,
            self.price_after_discount,
            self.sizes,
        )?;

        Ok(Product {
            id: self.id,
            title: self.title,
            color: self.color,
            sold: self.sold,
            pricing,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<Product> for ProductRecord {
    fn from(product: Product) -> Self {
        let (price, quantity, price_after_discount, sizes) = match product.pricing {
            ProductPricing::Flat {
                price,
                quantity,
                price_after_discount,
            } => (Some(price), Some(quantity), price_after_discount, Vec::new()),
            ProductPricing::Sized { variants } => (None, None, None, variants),
        };

        ProductRecord {
            id: product.id,
            title: product.title,
            color: product.color,
            price,
            quantity,
            price_after_discount,
            sizes,
            sold: product.sold,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

// =============================================================================
// App Settings
// =============================================================================

/// Shop-wide charges added to every non-empty cart.
///
/// There is at most one settings record; when none is stored both charges
/// are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppSettings {
    pub tax_price: Money,
    pub shipping_price: Money,
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Where an order ships to. Copied verbatim onto the order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingAddress {
    pub details: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodType {
    /// Paid online through the payment provider.
    Card,
    /// Cash on delivery.
    #[default]
    Cash,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Card => "card",
            PaymentMethodType::Cash => "cash",
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes() -> Vec<SizeVariant> {
        vec![
            SizeVariant::new("s", 0, Money::from_cents(1500)),
            SizeVariant::new("M", 5, Money::from_cents(1500)),
        ]
    }

    #[test]
    fn test_discount_rate() {
        assert_eq!(DiscountRate::from_percent(10).bps(), 1000);
        assert_eq!(DiscountRate::from_bps(1250).bps(), 1250);
    }

    #[test]
    fn test_size_is_normalized_and_matches_case_insensitively() {
        let variant = SizeVariant::new(" xl ", 1, Money::from_cents(100));
        assert_eq!(variant.size, "XL");
        assert!(variant.matches("xl"));
        assert!(!variant.matches("L"));
    }

    #[test]
    fn test_classify_flat() {
        let pricing = ProductPricing::classify(
            "p1",
            Some(Money::from_cents(1000)),
            Some(3),
            None,
            Vec::new(),
        )
        .unwrap();
        assert!(!pricing.is_sized());
        assert!(matches!(pricing, ProductPricing::Flat { quantity: 3, .. }));
    }

    #[test]
    fn test_classify_sized() {
        let pricing = ProductPricing::classify("p1", None, None, None, sizes()).unwrap();
        assert!(pricing.is_sized());
        assert_eq!(pricing.find_variant("m").map(|v| v.quantity), Some(5));
        assert!(pricing.find_variant("XL").is_none());
    }

    #[test]
    fn test_classify_rejects_both_and_neither() {
        let both = ProductPricing::classify(
            "p1",
            Some(Money::from_cents(1000)),
            Some(3),
            None,
            sizes(),
        );
        assert_eq!(
            both,
            Err(CoreError::InvalidState {
                product_id: "p1".to_string()
            })
        );

        let neither = ProductPricing::classify("p2", None, None, None, Vec::new());
        assert!(matches!(neither, Err(CoreError::InvalidState { .. })));

        let half = ProductPricing::classify("p3", Some(Money::from_cents(1)), None, None, Vec::new());
        assert!(matches!(half, Err(CoreError::InvalidState { .. })));
    }

    #[test]
    fn test_effective_price_prefers_sale_price() {
        let product = Product::new(
            "Tee",
            Some("red"),
            ProductPricing::Flat {
                price: Money::from_cents(2000),
                quantity: 4,
                price_after_discount: Some(Money::from_cents(1500)),
            },
        )
        .unwrap();

        assert_eq!(product.effective_price(None), Some(Money::from_cents(1500)));
        assert_eq!(product.effective_price(Some("M")), None);
    }

    #[test]
    fn test_product_new_rejects_duplicate_sizes() {
        let result = Product::new(
            "Tee",
            None,
            ProductPricing::sized(vec![
                SizeVariant::new("m", 1, Money::from_cents(100)),
                SizeVariant::new("M", 2, Money::from_cents(100)),
            ]),
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_record_round_trips_through_product() {
        let product = Product::new("Hoodie", None, ProductPricing::sized(sizes())).unwrap();
        let record = ProductRecord::from(product.clone());
        assert!(record.price.is_none());
        assert_eq!(record.sizes.len(), 2);
        assert_eq!(record.into_product().unwrap(), product);
    }

    #[test]
    fn test_payment_method_default_is_cash() {
        assert_eq!(PaymentMethodType::default(), PaymentMethodType::Cash);
        assert_eq!(PaymentMethodType::Card.as_str(), "card");
    }
}
