//! Remote operational-order endpoint client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::aggregates::OperationalOrder;
use crate::ports::{OperationalOrderGateway, PortError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveOrdersRequest {
    pub orders: Vec<OperationalOrder>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SaveOrdersResponse {
    pub success: bool,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct HttpOperationalOrders {
    client: Client,
    endpoint: String,
}

impl HttpOperationalOrders {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, PortError> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self { client, endpoint: endpoint.into() })
    }
}

#[async_trait]
impl OperationalOrderGateway for HttpOperationalOrders {
    async fn save_orders(&self, orders: &[OperationalOrder]) -> Result<Vec<String>, PortError> {
        let request = SaveOrdersRequest { orders: orders.to_vec() };
        let resp = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = resp.status();
        let body: SaveOrdersResponse = resp.json().await.map_err(|e| PortError::Rejected(format!("HTTP {status}: {e}")))?;
        if !body.success {
            return Err(PortError::Rejected(body.error.unwrap_or_else(|| format!("HTTP {status}"))));
        }
        info!(count = body.ids.len(), endpoint = %self.endpoint, "operational orders accepted");
        Ok(body.ids)
    }
}
