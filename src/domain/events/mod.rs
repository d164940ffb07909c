//! Domain events
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CheckoutEvent {
    SaleCompleted { sale_id: String, folio: String, total: f64, degraded: bool },
    StockDecremented { sale_id: String, product_id: String, remaining: u32 },
    OperationalOrdersCreated { sale_id: String, order_ids: Vec<String>, stored_locally: bool },
}

impl CheckoutEvent {
    pub fn subject(&self) -> &'static str {
        match self {
            Self::SaleCompleted { .. } => "pos.sale.completed",
            Self::StockDecremented { .. } => "pos.stock.decremented",
            Self::OperationalOrdersCreated { .. } => "pos.operational_orders.created",
        }
    }

    pub fn sale_id(&self) -> &str {
        match self {
            Self::SaleCompleted { sale_id, .. } | Self::StockDecremented { sale_id, .. } | Self::OperationalOrdersCreated { sale_id, .. } => sale_id,
        }
    }
}
