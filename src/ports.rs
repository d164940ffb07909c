//! Collaborator boundaries used by checkout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{CatalogProduct, OperationalOrder, Totals};
use crate::domain::events::CheckoutEvent;
use crate::domain::logistics::LogisticsDetails;
use crate::domain::value_objects::PaymentMethod;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("messaging error: {0}")]
    Messaging(String),
}

/// Identifiers attached to every sale; cached locally so they are not looked up per checkout.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleContext {
    pub branch_id: Option<String>,
    pub customer_id: Option<String>,
    pub rep_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleLineSummary {
    pub kind: String,
    pub product_id: Option<String>,
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalePayload {
    #[serde(flatten)]
    pub context: SaleContext,
    pub lines: Vec<SaleLineSummary>,
    pub totals: Totals,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub logistics: LogisticsDetails,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale_id: String,
    pub folio: String,
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_product(&self, id: &str) -> Result<CatalogProduct, PortError>;
    /// Atomically lowers stock by `quantity`, clamping at zero, and returns what remains.
    async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<u32, PortError>;
}

#[async_trait]
pub trait SaleGateway: Send + Sync {
    async fn submit_sale(&self, payload: &SalePayload) -> Result<SaleReceipt, PortError>;
}

#[async_trait]
pub trait SaleItemGateway: Send + Sync {
    async fn submit_sale_items(&self, sale_id: &str, lines: &[SaleLineSummary]) -> Result<(), PortError>;
}

#[async_trait]
pub trait OperationalOrderGateway: Send + Sync {
    /// Persists the orders and returns their ids.
    async fn save_orders(&self, orders: &[OperationalOrder]) -> Result<Vec<String>, PortError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &CheckoutEvent) -> Result<(), PortError>;
}
