//! # Cart Reconciliation
//!
//! Re-validates every cart line against the live catalog before any price
//! is computed or any order is cut.
//!
//! ## Per-Line Decision
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for each CartItem                                                      │
//! │       │                                                                 │
//! │       ├── product gone (or not purchasable)?  ──► drop line            │
//! │       │                                                                 │
//! │       ├── colour changed?                     ──► overwrite colour     │
//! │       │                                                                 │
//! │       ├── size no longer offered              ──► drop line            │
//! │       │   (or shape changed flat ⇄ sized)?                             │
//! │       │                                                                 │
//! │       └── effective price changed?            ──► overwrite price      │
//! │                                                                         │
//! │  Quantity is NEVER clamped here. Stock is enforced at add/update time  │
//! │  and by the guarded decrements of the checkout transaction.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reconciliation is idempotent: a second pass over an already reconciled
//! cart reports nothing and changes nothing.

use std::collections::HashMap;

use serde::Serialize;

use crate::cart::Cart;
use crate::types::{Product, ProductRecord};

// =============================================================================
// Product Index
// =============================================================================

/// The live products a cart refers to, keyed by id.
///
/// Records that fail shape classification are kept out of the index and
/// listed separately, so lines pointing at them are dropped like lines
/// pointing at deleted products.
#[derive(Debug, Clone, Default)]
pub struct ProductIndex {
    products: HashMap<String, Product>,
    unpurchasable: Vec<String>,
}

impl ProductIndex {
    /// Builds the index from raw stored records.
    pub fn from_records(records: impl IntoIterator<Item = ProductRecord>) -> Self {
        let mut index = ProductIndex::default();
        for record in records {
            let id = record.id.clone();
            match record.into_product() {
                Ok(product) => {
                    index.products.insert(id, product);
                }
                Err(_) => index.unpurchasable.push(id),
            }
        }
        index
    }

    /// Builds the index from already classified products.
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        ProductIndex {
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
            unpurchasable: Vec::new(),
        }
    }

    pub fn get(&self, product_id: &str) -> Option<&Product> {
        self.products.get(product_id)
    }

    /// Ids of stored products in neither legal shape.
    pub fn unpurchasable(&self) -> &[String] {
        &self.unpurchasable
    }
}

// =============================================================================
// Report
// =============================================================================

/// Why a line was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// The product no longer exists or cannot be sold.
    ProductMissing,
    /// The line's size is no longer offered.
    SizeMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedLine {
    pub item_id: String,
    pub product_id: String,
    pub reason: RemovalReason,
}

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub removed: Vec<RemovedLine>,
    /// Ids of lines whose unit price was overwritten.
    pub repriced: Vec<String>,
    /// Ids of lines whose colour was overwritten.
    pub recolored: Vec<String>,
}

impl ReconcileReport {
    /// True when the pass changed anything at all.
    pub fn has_drift(&self) -> bool {
        !self.removed.is_empty() || !self.repriced.is_empty() || !self.recolored.is_empty()
    }
}

// =============================================================================
// Reconcile
// =============================================================================

/// Brings every line of `cart` in line with `products`, in place.
pub fn reconcile(cart: &mut Cart, products: &ProductIndex) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    cart.items.retain_mut(|item| {
        let Some(product) = products.get(&item.product_id) else {
            report.removed.push(RemovedLine {
                item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                reason: RemovalReason::ProductMissing,
            });
            return false;
        };

        if product.color != item.color {
            item.color = product.color.clone();
            report.recolored.push(item.id.clone());
        }

        let Some(price) = product.effective_price(item.size.as_deref()) else {
            report.removed.push(RemovedLine {
                item_id: item.id.clone(),
                product_id: item.product_id.clone(),
                reason: RemovalReason::SizeMissing,
            });
            return false;
        };

        if price != item.price {
            item.price = price;
            item.refresh_line_total();
            report.repriced.push(item.id.clone());
        }

        true
    });

    report
}

// =============================================================================
// Unit Tests
// =============================================================================
