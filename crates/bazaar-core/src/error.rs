//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Cart / stock / product-shape rule violations   │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bazaar-service errors                                                 │
//! │  └── ServiceError     - What the HTTP host sees (code + status)        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ServiceError → HTTP 4xx           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant here is recoverable and user-facing. Nothing in the core
//! is a process-level failure.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations raised while resolving a
/// cart line against a product or while materializing an order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The product has no size variant matching the requested size.
    #[error("Product {product_id} has no size '{size}'")]
    SizeNotFound { product_id: String, size: String },

    /// A size was supplied for a product that is sold as a single SKU.
    #[error("Product {product_id} has no sizes")]
    SizeNotSupported { product_id: String },

    /// The product is sold only in sizes and no size was supplied.
    #[error("Size is required for product {product_id}")]
    SizeRequired { product_id: String },

    /// The product (or the requested size) has zero stock.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (size: S)
    ///      │
    ///      ▼
    /// Variant S: quantity = 0
    ///      │
    ///      ▼
    /// OutOfStock → "Product P1 (size S) is not available"
    /// ```
    #[error("Product {product_id}{} is not available", size_suffix(.size))]
    OutOfStock {
        product_id: String,
        size: Option<String>,
    },

    /// More units requested than are in stock.
    ///
    /// The message always states how many units remain so the shopper can
    /// adjust the quantity.
    #[error(
        "Only {available} left in stock for product {product_id}{}, requested {requested}",
        size_suffix(.size)
    )]
    InsufficientStock {
        product_id: String,
        size: Option<String>,
        available: i64,
        requested: i64,
    },

    /// The product is neither a flat SKU nor a sized product and cannot be
    /// sold until an admin fixes it.
    #[error("Product {product_id} is not purchasable: it must have either a price and quantity or sizes")]
    InvalidState { product_id: String },

    /// The cart has no line with the given id.
    #[error("Cart item not found: {0}")]
    CartItemNotFound(String),

    /// The coupon code does not exist or has expired. Deliberately one
    /// variant for both cases.
    #[error("Coupon is invalid or has expired")]
    CouponInvalid,

    /// A checkout was attempted on a cart with no lines.
    #[error("Order not valid: cart has no items")]
    EmptyOrder,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

fn size_suffix(size: &Option<String>) -> String {
    match size {
        Some(size) => format!(" (size {size})"),
        None => String::new(),
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., the same size listed twice).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_states_remaining() {
        let err = CoreError::InsufficientStock {
            product_id: "p1".to_string(),
            size: Some("M".to_string()),
            available: 5,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "Only 5 left in stock for product p1 (size M), requested 10"
        );

        let flat = CoreError::InsufficientStock {
            product_id: "p2".to_string(),
            size: None,
            available: 2,
            requested: 3,
        };
        assert_eq!(
            flat.to_string(),
            "Only 2 left in stock for product p2, requested 3"
        );
    }

    #[test]
    fn test_out_of_stock_message() {
        let err = CoreError::OutOfStock {
            product_id: "p1".to_string(),
            size: Some("S".to_string()),
        };
        assert_eq!(err.to_string(), "Product p1 (size S) is not available");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "size".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
