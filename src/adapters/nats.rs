//! NATS event publisher.

use async_trait::async_trait;

use crate::domain::events::CheckoutEvent;
use crate::ports::{EventPublisher, PortError};

#[derive(Clone, Debug)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub async fn connect(url: &str) -> Result<Self, PortError> {
        let client = async_nats::connect(url).await.map_err(|e| PortError::Messaging(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &CheckoutEvent) -> Result<(), PortError> {
        let payload = serde_json::to_vec(event).map_err(|e| PortError::Messaging(e.to_string()))?;
        self.client.publish(event.subject().to_string(), payload.into()).await.map_err(|e| PortError::Messaging(e.to_string()))
    }
}
