//! Stock status derivation.

use serde::{Deserialize, Serialize};

use crate::models::text_enum;

text_enum! {
    /// Availability badge derived from an inventory record's quantity.
    pub enum StockStatus {
        InStock => "IN_STOCK",
        LowStock => "LOW_STOCK",
        OutOfStock => "OUT_OF_STOCK",
    }
}

/// Derive the stock status for a quantity and its reorder threshold.
///
/// An empty (or negative) quantity is always [`StockStatus::OutOfStock`],
/// whatever the threshold.  A threshold of `0` therefore never yields
/// [`StockStatus::LowStock`].
pub fn evaluate(quantity: i64, min_stock: i64) -> StockStatus {
    if quantity <= 0 {
        StockStatus::OutOfStock
    } else if quantity <= min_stock {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}
