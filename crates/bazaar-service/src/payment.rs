//! # Payment Gateway
//!
//! The seam between checkout and the hosted payment provider.
//!
//! ## Card Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Storefront          OrderService               PaymentGateway          │
//! │  ──────────          ────────────               ──────────────          │
//! │                                                                         │
//! │  "Pay by card" ───► create_checkout_session                             │
//! │                       reconcile / abort on drift                        │
//! │                       create_session(request) ──► provider session      │
//! │  ◄── redirect url ◄── SessionHandle                                     │
//! │                                                                         │
//! │  (shopper pays on provider page)                                        │
//! │                                                                         │
//! │  provider webhook ─► complete_checkout_session                          │
//! │                       verify_webhook(payload, sig) ──► CompletedSession │
//! │                       cart unchanged? commit order (card, paid)         │
//! │                       otherwise       commit order (card, unpaid)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The provider only ever sees the amount, currency, cart id and version,
//! and the shipping address it must hand back on completion.

use async_trait::async_trait;
use bazaar_core::ShippingAddress;
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Everything the provider needs to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    /// Returned verbatim by the provider as the client reference.
    pub cart_id: String,
    /// Version of the saved cart the amount was taken from.
    pub cart_version: i64,
    pub user_id: String,
    /// Amount due in minor currency units.
    pub amount_minor: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Carried as session metadata; the order is built from it on completion.
    pub shipping_address: ShippingAddress,
}

/// A created provider session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: String,
    /// Where the shopper is redirected to pay.
    pub url: String,
}

/// A verified "session completed" webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedSession {
    pub session_id: String,
    /// The `cart_id` the session was created with.
    pub cart_id: String,
    /// The `cart_version` the session was created with.
    pub cart_version: i64,
    /// Amount actually charged, in minor currency units.
    pub amount_minor: i64,
    pub shipping_address: ShippingAddress,
}

/// Errors raised by a payment gateway implementation.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The webhook signature did not verify.
    #[error("Webhook signature verification failed")]
    InvalidSignature,

    /// The event verified but is not a completed checkout session.
    #[error("Unexpected webhook event: {0}")]
    UnexpectedEvent(String),

    /// The provider rejected the request or could not be reached.
    #[error("Payment provider error: {0}")]
    Provider(String),
}

/// Hosted payment provider.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout session for the given amount.
    async fn create_session(&self, request: SessionRequest) -> Result<SessionHandle, PaymentError>;

    /// Verifies a webhook delivery and decodes the completed session.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<CompletedSession, PaymentError>;
}
