//! # Service Error Type
//!
//! Unified error type for cart and order operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Bazaar                                 │
//! │                                                                         │
//! │  bazaar-core                 bazaar-db               bazaar-service     │
//! │  ───────────                 ─────────               ──────────────     │
//! │  CoreError::OutOfStock ─────────────────────────────► Unavailable       │
//! │  CoreError::CouponInvalid ──────────────────────────► NotFound          │
//! │                              DbError::Conflict ─────► Conflict          │
//! │                              DbError::StockExhausted► InsufficientStock │
//! │                              DbError::QueryFailed ──► Database          │
//! │                                                                         │
//! │  The HTTP host calls `code()` / `http_status()` / `body()` and never    │
//! │  matches on the variants itself.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every shopper-caused error maps to a 4xx status. Only storage and
//! provider failures map to 5xx.

use serde::Serialize;
use tracing::error;

use crate::payment::PaymentError;
use bazaar_core::CoreError;
use bazaar_db::DbError;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by [`crate::CartService`] and [`crate::OrderService`].
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Cart, product, size, coupon, order or line absent.
    #[error("{0}")]
    NotFound(String),

    /// Malformed input, such as a missing size for a sized product.
    #[error("{0}")]
    InvalidArgument(String),

    /// The product or size has no stock at all.
    #[error("{0}")]
    Unavailable(String),

    /// More units requested than remain.
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

    /// The product is neither flat nor sized.
    #[error("{0}")]
    InvalidState(String),

    /// Checkout of an empty cart.
    #[error("{0}")]
    InvalidOrder(String),

    /// Reconciliation changed the cart during checkout.
    ///
    /// ## When This Occurs
    /// A product in the cart was deleted, lost the chosen size, or changed
    /// price or colour since the shopper last saw the cart. The corrected
    /// cart has already been saved; the shopper reviews it and retries.
    #[error("Some products in your cart are no longer available as requested; the cart has been updated")]
    StaleCart,

    /// A concurrent request changed the same cart first.
    #[error("{0}")]
    Conflict(String),

    /// Payment provider failure.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// Storage failure.
    #[error("Database operation failed")]
    Database(#[source] DbError),
}

fn size_suffix(size: &Option<String>) -> String {
    size.as_ref()
        .map(|s| format!(" (size {s})"))
        .unwrap_or_default()
}

/// Machine-readable error codes.
///
/// Serialized as `"NOT_FOUND"`, `"STALE_CART"`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    InvalidArgument,
    Unavailable,
    InsufficientStock,
    InvalidState,
    InvalidOrder,
    StaleCart,
    Conflict,
    PaymentError,
    DatabaseError,
}

/// What a client receives when an operation fails.
///
/// ```json
/// { "code": "INSUFFICIENT_STOCK", "message": "Only 5 left in stock for product P1 (size M), requested 10" }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl ServiceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::NotFound(_) => ErrorCode::NotFound,
            ServiceError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            ServiceError::Unavailable(_) => ErrorCode::Unavailable,
            ServiceError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            ServiceError::InvalidState(_) => ErrorCode::InvalidState,
            ServiceError::InvalidOrder(_) => ErrorCode::InvalidOrder,
            ServiceError::StaleCart => ErrorCode::StaleCart,
            ServiceError::Conflict(_) => ErrorCode::Conflict,
            ServiceError::Payment(_) => ErrorCode::PaymentError,
            ServiceError::Database(_) => ErrorCode::DatabaseError,
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::InvalidArgument(_) | ServiceError::InvalidOrder(_) => 400,
            ServiceError::Unavailable(_)
            | ServiceError::InsufficientStock { .. }
            | ServiceError::StaleCart
            | ServiceError::Conflict(_) => 409,
            ServiceError::InvalidState(_) => 422,
            ServiceError::Payment(PaymentError::InvalidSignature) => 400,
            ServiceError::Payment(PaymentError::UnexpectedEvent(_)) => 400,
            ServiceError::Payment(PaymentError::Provider(_)) => 502,
            ServiceError::Database(_) => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SizeNotFound { .. }
            | CoreError::CartItemNotFound(_)
            | CoreError::CouponInvalid => ServiceError::NotFound(err.to_string()),
            CoreError::SizeNotSupported { .. }
            | CoreError::SizeRequired { .. }
            | CoreError::Validation(_) => ServiceError::InvalidArgument(err.to_string()),
            CoreError::OutOfStock { .. } => ServiceError::Unavailable(err.to_string()),
            CoreError::InsufficientStock {
                product_id,
                size,
                available,
                requested,
            } => ServiceError::InsufficientStock {
                product_id,
                size,
                available,
                requested,
            },
            CoreError::InvalidState { .. } => ServiceError::InvalidState(err.to_string()),
            CoreError::EmptyOrder => ServiceError::InvalidOrder(err.to_string()),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => {
                ServiceError::NotFound(format!("{entity} not found: {id}"))
            }
            DbError::UniqueViolation { field, value } => {
                ServiceError::Conflict(format!("{field} '{value}' already exists"))
            }
            DbError::Conflict { entity, id } => ServiceError::Conflict(format!(
                "{entity} {id} was modified by another request, please retry"
            )),
            DbError::StockExhausted {
                product_id,
                size,
                available,
                requested,
            } => ServiceError::InsufficientStock {
                product_id,
                size,
                available,
                requested,
            },
            other => {
                error!(error = %other, "Database operation failed");
                ServiceError::Database(other)
            }
        }
    }
}
