//! Pricing primitives
//!
//! Plain floating-point arithmetic, no intermediate rounding. Rounding happens
//! only when amounts are displayed.

use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{ServiceType, TAX_RATE};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinePricing {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

impl LinePricing {
    pub fn compute(unit_price: f64, quantity: u32, taxable: bool) -> Self {
        let subtotal = unit_price * f64::from(quantity);
        let tax = if taxable { subtotal * TAX_RATE } else { 0.0 };
        Self { subtotal, tax, total: subtotal + tax }
    }
}

pub fn product_line(unit_price: f64, quantity: u32) -> LinePricing { LinePricing::compute(unit_price, quantity, true) }

pub fn fabrication_line(unit_price: f64, quantity: u32) -> LinePricing { LinePricing::compute(unit_price, quantity, true) }

/// Services always count as a single unit at their catalog price.
pub fn service_line(service: ServiceType) -> LinePricing { LinePricing::compute(service.price(), 1, service.is_taxable()) }

/// Splits a tax-inclusive grand total back into subtotal and tax.
pub fn split_tax_inclusive(total: f64) -> (f64, f64) {
    let subtotal = total / (1.0 + TAX_RATE);
    (subtotal, total - subtotal)
}
