//! Operational orders derived from a completed sale

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::cart::Cart;
use crate::domain::logistics::LogisticsDetails;
use crate::domain::value_objects::{is_filled, ServiceType};

/// Downstream fulfillment task. Produced by checkout and handed off; never retained.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationalOrder {
    pub id: String,
    pub status: OrderStatus,
    pub sale_id: String,
    pub sale_folio: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: OrderDetails,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus { #[default] Pending, Scheduled, InProgress, Completed, Cancelled }

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self { Self::Pending => "pending", Self::Scheduled => "scheduled", Self::InProgress => "in_progress", Self::Completed => "completed", Self::Cancelled => "cancelled" }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType { Delivery, Installation, Fabrication }

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self { Self::Delivery => "delivery", Self::Installation => "installation", Self::Fabrication => "fabrication" }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderDetails {
    Delivery(DeliverySchedule),
    Installation(InstallationSchedule),
    Fabrication(FabricationSummary),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliverySchedule {
    pub address: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time_window: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationSchedule {
    pub address: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time_window: Option<String>,
    #[serde(default)]
    pub wall_type: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// One summary for every pre-order line of a sale.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricationSummary {
    pub items: Vec<FabricationEntry>,
    /// Latest promised date across the items.
    #[serde(default)]
    pub promised_date: Option<NaiveDate>,
    pub advance_total: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FabricationEntry {
    pub product_id: String,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    #[serde(default)]
    pub promised_date: Option<NaiveDate>,
    #[serde(default)]
    pub advance_payment: Option<f64>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl OperationalOrder {
    pub fn create(sale_id: &str, sale_folio: &str, details: OrderDetails) -> Self {
        Self {
            id: Uuid::new_v4().to_string(), status: OrderStatus::Pending,
            sale_id: sale_id.to_string(), sale_folio: sale_folio.to_string(),
            created_at: Utc::now(), details,
        }
    }

    pub fn order_type(&self) -> OrderType {
        match self.details {
            OrderDetails::Delivery(_) => OrderType::Delivery,
            OrderDetails::Installation(_) => OrderType::Installation,
            OrderDetails::Fabrication(_) => OrderType::Fabrication,
        }
    }
}

/// Delivery and installation orders need both the service line and an address;
/// all fabrication lines collapse into a single order.
pub fn derive_operational_orders(cart: &Cart, logistics: &LogisticsDetails, sale_id: &str, sale_folio: &str) -> Vec<OperationalOrder> {
    let mut orders = vec![];

    if cart.has_service(ServiceType::Delivery) && is_filled(&logistics.delivery_address) {
        orders.push(OperationalOrder::create(sale_id, sale_folio, OrderDetails::Delivery(DeliverySchedule {
            address: logistics.delivery_address.clone().unwrap_or_default(),
            date: logistics.delivery_date,
            time_window: logistics.delivery_time_window.clone(),
            notes: logistics.delivery_notes.clone(),
        })));
    }

    if cart.has_service(ServiceType::Installation) && is_filled(&logistics.installation_address) {
        orders.push(OperationalOrder::create(sale_id, sale_folio, OrderDetails::Installation(InstallationSchedule {
            address: logistics.installation_address.clone().unwrap_or_default(),
            contact_name: logistics.installation_contact_name.clone(),
            contact_phone: logistics.installation_contact_phone.clone(),
            date: logistics.installation_date,
            time_window: logistics.installation_time_window.clone(),
            wall_type: logistics.installation_wall_type.clone(),
            notes: logistics.installation_notes.clone(),
        })));
    }

    let items: Vec<FabricationEntry> = cart.fabrication_lines().map(|f| FabricationEntry {
        product_id: f.product_id.clone(), name: f.name.clone(), sku: f.sku.clone(), quantity: f.quantity,
        promised_date: f.details.promised_date, advance_payment: f.details.advance_payment, notes: f.details.notes.clone(),
    }).collect();
    if !items.is_empty() {
        let promised_date = items.iter().filter_map(|i| i.promised_date).max();
        let advance_total = items.iter().filter_map(|i| i.advance_payment).sum();
        orders.push(OperationalOrder::create(sale_id, sale_folio, OrderDetails::Fabrication(FabricationSummary { items, promised_date, advance_total })));
    }

    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::FabricationDetails;
    use crate::domain::aggregates::product::CatalogProduct;

    fn date(d: u32) -> Option<NaiveDate> { NaiveDate::from_ymd_opt(2026, 11, d) }

    #[test]
    fn test_no_orders_for_plain_sale() {
        let mut cart = Cart::new();
        cart.add_product(&CatalogProduct::new("A", "S", "Lamp", 100.0, 5), 1).unwrap();
        assert!(derive_operational_orders(&cart, &LogisticsDetails::default(), "s1", "V-000001").is_empty());
    }

    #[test]
    fn test_delivery_requires_address() {
        let mut cart = Cart::new();
        cart.add_service(ServiceType::Delivery);
        assert!(derive_operational_orders(&cart, &LogisticsDetails::default(), "s1", "V-1").is_empty());
        let logistics = LogisticsDetails { delivery_address: Some("Calle 5 #12".into()), delivery_date: date(3), ..Default::default() };
        let orders = derive_operational_orders(&cart, &logistics, "s1", "V-1");
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_type(), OrderType::Delivery);
        assert_eq!(orders[0].sale_folio, "V-1");
    }

    #[test]
    fn test_delivery_and_installation() {
        let mut cart = Cart::new();
        cart.add_service(ServiceType::Delivery);
        cart.add_service(ServiceType::Installation);
        let logistics = LogisticsDetails {
            delivery_address: Some("Calle 5".into()),
            installation_address: Some("Calle 5".into()),
            installation_wall_type: Some("concrete".into()),
            ..Default::default()
        };
        let orders = derive_operational_orders(&cart, &logistics, "s1", "V-1");
        let types: Vec<_> = orders.iter().map(OperationalOrder::order_type).collect();
        assert_eq!(types, vec![OrderType::Delivery, OrderType::Installation]);
    }

    #[test]
    fn test_fabrication_lines_aggregate() {
        let mut cart = Cart::new();
        let p = CatalogProduct::new("A", "S", "Closet", 4000.0, 0);
        cart.add_fabrication(&p, 1, FabricationDetails { promised_date: date(10), advance_payment: Some(1000.0), advance_required: true, notes: None }).unwrap();
        cart.add_fabrication(&p, 2, FabricationDetails { promised_date: date(20), advance_payment: Some(500.0), ..Default::default() }).unwrap();
        let orders = derive_operational_orders(&cart, &LogisticsDetails::default(), "s1", "V-1");
        assert_eq!(orders.len(), 1);
        let OrderDetails::Fabrication(summary) = &orders[0].details else { panic!("expected fabrication order") };
        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.promised_date, date(20));
        assert_eq!(summary.advance_total, 1500.0);
    }

    #[test]
    fn test_wire_shape() {
        let order = OperationalOrder::create("s1", "V-9", OrderDetails::Delivery(DeliverySchedule { address: "X".into(), ..Default::default() }));
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["type"], "delivery");
        assert_eq!(json["status"], "pending");
        let back: OperationalOrder = serde_json::from_value(json).unwrap();
        assert_eq!(back, order);
    }
}
