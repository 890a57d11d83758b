//! # Validation Module
//!
//! Input validation for Bazaar's catalog and checkout inputs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP host                                                    │
//! │  ├── Request shape (deserialization)                                   │
//! │  └── Auth: who owns the cart                                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: bazaar-core                                                  │
//! │  └── THIS MODULE: quantities, sizes, coupon codes, addresses           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (cart owner, coupon code, product size)                    │
//! │  └── CHECK (settings singleton)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bazaar_core::validation::{validate_coupon_code, validate_quantity};
//!
//! assert_eq!(validate_coupon_code(" summer10 ").unwrap(), "SUMMER10");
//! assert!(validate_quantity(5).is_ok());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{ShippingAddress, SizeVariant};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest size label accepted ("XXXL", "42-44", ...).
pub const MAX_SIZE_LEN: usize = 8;

const MAX_TITLE_LEN: usize = 200;
const MAX_COUPON_CODE_LEN: usize = 32;
const MAX_ADDRESS_FIELD_LEN: usize = 200;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product title.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_product_title(title: &str) -> ValidationResult<()> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }

    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: MAX_TITLE_LEN,
        });
    }

    Ok(())
}

/// Validates a single size label.
///
/// ## Rules
/// - 1 to 8 characters after trimming
pub fn validate_size(size: &str) -> ValidationResult<()> {
    let size = size.trim();

    if size.is_empty() {
        return Err(ValidationError::Required {
            field: "size".to_string(),
        });
    }

    if size.chars().count() > MAX_SIZE_LEN {
        return Err(ValidationError::TooLong {
            field: "size".to_string(),
            max: MAX_SIZE_LEN,
        });
    }

    Ok(())
}

/// Validates the size list of a sized product.
///
/// ## Rules
/// - At least one size
/// - Every label valid per [`validate_size`]
/// - No label repeated, ignoring case
pub fn validate_sizes(variants: &[SizeVariant]) -> ValidationResult<()> {
    if variants.is_empty() {
        return Err(ValidationError::Required {
            field: "sizes".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for variant in variants {
        validate_size(&variant.size)?;
        if !seen.insert(variant.size.trim().to_uppercase()) {
            return Err(ValidationError::Duplicate {
                field: "size".to_string(),
                value: variant.size.clone(),
            });
        }
    }

    Ok(())
}

/// Validates and normalizes a coupon code.
///
/// ## Returns
/// The trimmed, uppercased code that coupons are stored and matched under.
pub fn validate_coupon_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "coupon".to_string(),
        });
    }

    if code.chars().count() > MAX_COUPON_CODE_LEN {
        return Err(ValidationError::TooLong {
            field: "coupon".to_string(),
            max: MAX_COUPON_CODE_LEN,
        });
    }

    Ok(code.to_uppercase())
}

/// Validates a shipping address.
///
/// Every field is optional; present fields must be non-blank and bounded,
/// and a phone number may only hold digits, spaces and `+-()`.
pub fn validate_shipping_address(address: &ShippingAddress) -> ValidationResult<()> {
    let fields = [
        ("details", &address.details),
        ("phone", &address.phone),
        ("city", &address.city),
        ("postal_code", &address.postal_code),
    ];

    for (field, value) in fields {
        let Some(value) = value else { continue };
        if value.trim().is_empty() {
            return Err(ValidationError::Required {
                field: field.to_string(),
            });
        }
        if value.chars().count() > MAX_ADDRESS_FIELD_LEN {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: MAX_ADDRESS_FIELD_LEN,
            });
        }
    }

    if let Some(phone) = &address.phone {
        let ok = phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
        if !ok {
            return Err(ValidationError::InvalidFormat {
                field: "phone".to_string(),
                reason: "must contain only digits, spaces and + - ( )".to_string(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a requested cart quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Item / Update Quantity                                       │
/// │                                                                         │
/// │  Shopper requests quantity: 5                                          │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0?  → "quantity must be positive"                     │
/// │       ├── qty > 999? → "quantity must be between 1 and 999"            │
/// │       │                                                                 │
/// │       └── OK → stock check against the product / size                  │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a stock level. Zero is allowed (sold out).
pub fn validate_stock(quantity: i64) -> ValidationResult<()> {
    if quantity < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (free items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a coupon discount in basis points.
///
/// ## Rules
/// - 1% to 100% (100 to 10000 bps)
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if !(100..=10_000).contains(&bps) {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 1,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates that one more line fits in the cart.
pub fn validate_cart_size(current_items: usize) -> ValidationResult<()> {
    if current_items >= MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "cart items".to_string(),
            min: 0,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    #[test]
    fn test_validate_product_title() {
        assert!(validate_product_title("Linen Shirt").is_ok());
        assert!(validate_product_title("   ").is_err());
        assert!(validate_product_title(&"A".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_size() {
        assert!(validate_size("M").is_ok());
        assert!(validate_size("XXXL").is_ok());
        assert!(validate_size("").is_err());
        assert!(validate_size("TOOLONGSZ").is_err());
    }

    #[test]
    fn test_validate_sizes_rejects_case_insensitive_duplicates() {
        let ok = vec![
            SizeVariant::new("S", 1, Money::from_cents(100)),
            SizeVariant::new("M", 1, Money::from_cents(100)),
        ];
        assert!(validate_sizes(&ok).is_ok());

        let dup = vec![
            SizeVariant {
                size: "m".to_string(),
                quantity: 1,
                price: Money::from_cents(100),
                price_after_discount: None,
            },
            SizeVariant::new("M", 1, Money::from_cents(100)),
        ];
        assert!(matches!(
            validate_sizes(&dup),
            Err(ValidationError::Duplicate { .. })
        ));

        assert!(validate_sizes(&[]).is_err());
    }

    #[test]
    fn test_validate_coupon_code_normalizes() {
        assert_eq!(validate_coupon_code("save10").unwrap(), "SAVE10");
        assert!(validate_coupon_code("  ").is_err());
        assert!(validate_coupon_code(&"X".repeat(40)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_discount_bps() {
        assert!(validate_discount_bps(100).is_ok());
        assert!(validate_discount_bps(10_000).is_ok());
        assert!(validate_discount_bps(99).is_err());
        assert!(validate_discount_bps(10_001).is_err());
    }

    #[test]
    fn test_validate_shipping_address() {
        let address = ShippingAddress {
            details: Some("12 Market St".to_string()),
            phone: Some("+1 (555) 010-2030".to_string()),
            city: Some("Springfield".to_string()),
            postal_code: None,
        };
        assert!(validate_shipping_address(&address).is_ok());
        assert!(validate_shipping_address(&ShippingAddress::default()).is_ok());

        let bad_phone = ShippingAddress {
            phone: Some("call me".to_string()),
            ..ShippingAddress::default()
        };
        assert!(validate_shipping_address(&bad_phone).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(0).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_err());
    }
}
