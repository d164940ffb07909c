//! Catalog product snapshot

use serde::{Deserialize, Serialize};

/// A product as returned by the catalog collaborator at the moment it is added to a cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CatalogProduct {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub base_price: f64,
    pub stock: i32,
    #[serde(default)]
    pub barcode: Option<String>,
}

impl CatalogProduct {
    pub fn new(id: impl Into<String>, sku: impl Into<String>, name: impl Into<String>, base_price: f64, stock: u32) -> Self {
        Self { id: id.into(), sku: sku.into(), name: name.into(), base_price, stock: i32::try_from(stock).unwrap_or(i32::MAX), barcode: None }
    }


    /// On-hand units; negative counts from the store are treated as zero.
    pub fn on_hand(&self) -> u32 { u32::try_from(self.stock).unwrap_or(0) }
    pub fn is_in_stock(&self) -> bool { self.on_hand() > 0 }

    /// Units still sellable once `reserved` units sit in an open cart.
    pub fn available(&self, reserved: u32) -> u32 { self.on_hand().saturating_sub(reserved) }
}
