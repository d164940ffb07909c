//! Cart Aggregate
//!
//! An ordered list of product, service and fabrication lines. Totals are always
//! recomputed from the lines; nothing is cached.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::domain::aggregates::product::CatalogProduct;
use crate::domain::pricing::{self, LinePricing};
use crate::domain::value_objects::{LineId, ServiceType};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<LineItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineId,
    #[serde(flatten)]
    pub kind: LineKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineKind {
    Product(ProductLine),
    Service(ServiceLine),
    Fabrication(FabricationLine),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductLine {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub unit_price: f64,
    pub quantity: u32,
    #[serde(default)]
    pub barcode: Option<String>,
    /// On-hand stock known when the line was last touched; `None` for untracked products.
    #[serde(default)]
    pub stock: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceLine {
    pub service_type: ServiceType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FabricationLine {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub details: FabricationDetails,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricationDetails {
    #[serde(default)]
    pub promised_date: Option<NaiveDate>,
    #[serde(default)]
    pub advance_payment: Option<f64>,
    #[serde(default)]
    pub advance_required: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Aggregate projection over a cart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Products and fabrication lines, before tax.
    pub subtotal: f64,
    pub products_tax: f64,
    pub services_tax: f64,
    /// Services, tax included.
    pub services_total: f64,
    /// Reserved for discount rules; always zero for now.
    pub discount: f64,
    pub total: f64,
}

impl Totals {
    pub fn tax(&self) -> f64 { self.products_tax + self.services_tax }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityChange { Updated(u32), Removed, Unchanged }

impl LineItem {
    pub fn pricing(&self) -> LinePricing {
        match &self.kind {
            LineKind::Product(p) => pricing::product_line(p.unit_price, p.quantity),
            LineKind::Service(s) => pricing::service_line(s.service_type),
            LineKind::Fabrication(f) => pricing::fabrication_line(f.unit_price, f.quantity),
        }
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            LineKind::Product(p) => &p.name,
            LineKind::Service(s) => s.service_type.label(),
            LineKind::Fabrication(f) => &f.name,
        }
    }

    pub fn quantity(&self) -> u32 {
        match &self.kind {
            LineKind::Product(p) => p.quantity,
            LineKind::Service(_) => 1,
            LineKind::Fabrication(f) => f.quantity,
        }
    }

    pub fn unit_price(&self) -> f64 {
        match &self.kind {
            LineKind::Product(p) => p.unit_price,
            LineKind::Service(s) => s.service_type.price(),
            LineKind::Fabrication(f) => f.unit_price,
        }
    }

    pub fn product_id(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Product(p) => Some(&p.product_id),
            LineKind::Fabrication(f) => Some(&f.product_id),
            LineKind::Service(_) => None,
        }
    }

    pub fn service_type(&self) -> Option<ServiceType> {
        match &self.kind { LineKind::Service(s) => Some(s.service_type), _ => None }
    }

    pub fn as_product(&self) -> Option<&ProductLine> {
        match &self.kind { LineKind::Product(p) => Some(p), _ => None }
    }

    pub fn as_fabrication(&self) -> Option<&FabricationLine> {
        match &self.kind { LineKind::Fabrication(f) => Some(f), _ => None }
    }
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn item_count(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn line(&self, id: &LineId) -> Option<&LineItem> { self.items.iter().find(|i| &i.id == id) }

    /// Adds stock-backed units, merging into the existing line for the same product.
    /// Products without stock should be routed to [`Cart::add_fabrication`] by the caller.
    pub fn add_product(&mut self, product: &CatalogProduct, quantity: u32) -> Result<LineId, CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        if let Some(existing) = self.items.iter_mut().find(|i| matches!(&i.kind, LineKind::Product(p) if p.product_id == product.id)) {
            if let LineKind::Product(p) = &mut existing.kind {
                p.quantity = p.quantity.saturating_add(quantity);
                p.stock = Some(product.on_hand());
            }
            return Ok(existing.id.clone());
        }
        let id = LineId::generate();
        self.items.push(LineItem {
            id: id.clone(),
            kind: LineKind::Product(ProductLine {
                product_id: product.id.clone(), name: product.name.clone(), sku: product.sku.clone(),
                unit_price: product.base_price, quantity, barcode: product.barcode.clone(), stock: Some(product.on_hand()),
            }),
        });
        Ok(id)
    }

    /// Always appends a new pre-order line; never merged.
    pub fn add_fabrication(&mut self, product: &CatalogProduct, quantity: u32, details: FabricationDetails) -> Result<LineId, CartError> {
        if quantity == 0 { return Err(CartError::InvalidQuantity); }
        let id = LineId::generate();
        self.items.push(LineItem {
            id: id.clone(),
            kind: LineKind::Fabrication(FabricationLine {
                product_id: product.id.clone(), name: product.name.clone(), sku: product.sku.clone(),
                unit_price: product.base_price, quantity, details,
            }),
        });
        Ok(id)
    }

    /// Idempotent: returns the existing line when the service is already present.
    pub fn add_service(&mut self, service_type: ServiceType) -> LineId {
        if let Some(existing) = self.items.iter().find(|i| i.service_type() == Some(service_type)) {
            return existing.id.clone();
        }
        let id = LineId::generate();
        self.items.push(LineItem { id: id.clone(), kind: LineKind::Service(ServiceLine { service_type }) });
        id
    }

    pub fn remove_service(&mut self, service_type: ServiceType) -> usize {
        let before = self.items.len();
        self.items.retain(|i| i.service_type() != Some(service_type));
        before - self.items.len()
    }

    pub fn has_service(&self, service_type: ServiceType) -> bool {
        self.items.iter().any(|i| i.service_type() == Some(service_type))
    }

    /// Adjusts a stock-backed product line. Service and fabrication lines are left untouched,
    /// as is any change that would exceed the known on-hand stock.
    pub fn update_quantity(&mut self, id: &LineId, delta: i64) -> Result<QuantityChange, CartError> {
        let pos = self.items.iter().position(|i| &i.id == id).ok_or(CartError::ItemNotFound)?;
        let Some(LineItem { kind: LineKind::Product(line), .. }) = self.items.get_mut(pos) else {
            return Ok(QuantityChange::Unchanged);
        };
        let next = i64::from(line.quantity).saturating_add(delta);
        if next <= 0 {
            self.items.remove(pos);
            return Ok(QuantityChange::Removed);
        }
        if line.stock.is_some_and(|stock| next > i64::from(stock)) {
            return Ok(QuantityChange::Unchanged);
        }
        let next = u32::try_from(next).map_err(|_| CartError::InvalidQuantity)?;
        line.quantity = next;
        Ok(QuantityChange::Updated(next))
    }

    pub fn remove_item(&mut self, id: &LineId) -> Option<LineItem> {
        let pos = self.items.iter().position(|i| &i.id == id)?;
        Some(self.items.remove(pos))
    }

    /// Replaces fabrication details, converting a stock-backed product line into a pre-order in place.
    pub fn set_fabrication_details(&mut self, id: &LineId, details: FabricationDetails) -> Result<(), CartError> {
        let item = self.items.iter_mut().find(|i| &i.id == id).ok_or(CartError::ItemNotFound)?;
        match &mut item.kind {
            LineKind::Fabrication(f) => f.details = details,
            LineKind::Product(p) => {
                item.kind = LineKind::Fabrication(FabricationLine {
                    product_id: p.product_id.clone(), name: p.name.clone(), sku: p.sku.clone(),
                    unit_price: p.unit_price, quantity: p.quantity, details,
                });
            }
            LineKind::Service(_) => return Err(CartError::NotFabricable),
        }
        Ok(())
    }

    /// Units of `product_id` held by stock-backed lines in this cart.
    pub fn reserved_stock(&self, product_id: &str) -> u32 {
        self.items.iter()
            .filter_map(LineItem::as_product)
            .filter(|p| p.product_id == product_id)
            .map(|p| p.quantity)
            .sum()
    }

    /// Last known on-hand stock per stock-tracked product.
    pub fn known_stock(&self) -> HashMap<String, u32> {
        self.items.iter()
            .filter_map(LineItem::as_product)
            .filter_map(|p| p.stock.map(|s| (p.product_id.clone(), s)))
            .collect()
    }

    pub fn fabrication_lines(&self) -> impl Iterator<Item = &FabricationLine> { self.items.iter().filter_map(LineItem::as_fabrication) }

    pub fn totals(&self) -> Totals {
        let mut totals = Totals::default();
        for item in &self.items {
            let p = item.pricing();
            match &item.kind {
                LineKind::Service(_) => { totals.services_tax += p.tax; totals.services_total += p.total; }
                LineKind::Product(_) | LineKind::Fabrication(_) => { totals.subtotal += p.subtotal; totals.products_tax += p.tax; }
            }
        }
        totals.total = totals.subtotal + totals.products_tax + totals.services_total - totals.discount;
        totals
    }

    pub fn clear(&mut self) { self.items.clear(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("Item not found")]
    ItemNotFound,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Service lines cannot become fabrication orders")]
    NotFabricable,
}
