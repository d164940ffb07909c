//! Pre-checkout validation
//!
//! Collects every failure instead of stopping at the first one, so the cashier
//! sees the full list. Pure and cheap enough to run on each keystroke.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use crate::domain::aggregates::cart::{Cart, LineKind};
use crate::domain::logistics::LogisticsDetails;
use crate::domain::value_objects::{is_filled, ServiceType};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self { Self { valid: errors.is_empty(), errors } }
    pub fn is_valid(&self) -> bool { self.valid }
}

/// `stock` maps product ids to on-hand units; products missing from it are not stock-checked.
pub fn validate(cart: &Cart, logistics: &LogisticsDetails, stock: &HashMap<String, u32>) -> ValidationReport {
    let mut errors = vec![];

    if cart.is_empty() {
        errors.push("Cart is empty".to_string());
    }

    for item in cart.items() {
        match &item.kind {
            LineKind::Product(p) => {
                if let Some(&available) = stock.get(&p.product_id) {
                    if p.quantity > available {
                        errors.push(format!("Insufficient stock for {}: requested {}, available {}", p.name, p.quantity, available));
                    }
                }
            }
            LineKind::Fabrication(f) => {
                if f.details.promised_date.is_none() {
                    errors.push(format!("Fabrication item {} requires a promised date", f.name));
                }
                if f.details.advance_required && !f.details.advance_payment.is_some_and(|a| a > 0.0) {
                    errors.push(format!("Fabrication item {} requires an advance payment", f.name));
                }
            }
            LineKind::Service(_) => {}
        }
    }

    if cart.has_service(ServiceType::Delivery) {
        if !is_filled(&logistics.delivery_address) { errors.push("Delivery address is required".to_string()); }
        if logistics.delivery_date.is_none() { errors.push("Delivery date is required".to_string()); }
    }

    if cart.has_service(ServiceType::Installation) {
        if !is_filled(&logistics.installation_address) { errors.push("Installation address is required".to_string()); }
        if !is_filled(&logistics.installation_contact_name) { errors.push("Installation contact name is required".to_string()); }
        if !is_filled(&logistics.installation_contact_phone) { errors.push("Installation contact phone is required".to_string()); }
        if logistics.installation_date.is_none() { errors.push("Installation date is required".to_string()); }
    }

    ValidationReport::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::domain::aggregates::cart::FabricationDetails;
    use crate::domain::aggregates::product::CatalogProduct;

    fn sofa() -> CatalogProduct { CatalogProduct::new("A", "SOFA-01", "Sofa", 1000.0, 2) }

    #[test]
    fn test_empty_cart() {
        let report = validate(&Cart::new(), &LogisticsDetails::default(), &HashMap::new());
        assert!(!report.valid);
        assert_eq!(report.errors, vec!["Cart is empty"]);
    }

    #[test]
    fn test_delivery_address_required() {
        let mut cart = Cart::new();
        cart.add_product(&sofa(), 1).unwrap();
        cart.add_service(ServiceType::Delivery);
        let mut logistics = LogisticsDetails::default();
        let report = validate(&cart, &logistics, &cart.known_stock());
        assert!(!report.valid);
        assert!(report.errors.iter().any(|e| e.contains("Delivery address")));

        logistics.delivery_address = Some("Av. Juarez 100".into());
        logistics.delivery_date = NaiveDate::from_ymd_opt(2026, 10, 25);
        assert!(validate(&cart, &logistics, &cart.known_stock()).valid);
    }

    #[test]
    fn test_installation_collects_all_failures() {
        let mut cart = Cart::new();
        cart.add_service(ServiceType::Installation);
        let logistics = LogisticsDetails { installation_address: Some("Calle 1".into()), ..Default::default() };
        let report = validate(&cart, &logistics, &HashMap::new());
        assert_eq!(report.errors.len(), 3);
    }

    #[test]
    fn test_stock_check_uses_supplied_levels() {
        let mut cart = Cart::new();
        cart.add_product(&sofa(), 2).unwrap();
        let mut stock = HashMap::new();
        assert!(validate(&cart, &LogisticsDetails::default(), &stock).valid);
        stock.insert("A".to_string(), 1);
        let report = validate(&cart, &LogisticsDetails::default(), &stock);
        assert_eq!(report.errors, vec!["Insufficient stock for Sofa: requested 2, available 1"]);
    }

    #[test]
    fn test_fabrication_metadata() {
        let mut cart = Cart::new();
        cart.add_fabrication(&sofa(), 1, FabricationDetails { advance_required: true, advance_payment: Some(0.0), ..Default::default() }).unwrap();
        let report = validate(&cart, &LogisticsDetails::default(), &HashMap::new());
        assert_eq!(report.errors.len(), 2);

        let mut cart = Cart::new();
        cart.add_fabrication(&sofa(), 1, FabricationDetails {
            promised_date: NaiveDate::from_ymd_opt(2026, 12, 1), advance_required: true, advance_payment: Some(800.0), notes: None,
        }).unwrap();
        assert!(validate(&cart, &LogisticsDetails::default(), &HashMap::new()).valid);
    }
}
