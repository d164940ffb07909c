//! Event publisher that only writes checkout events to the log.
//!
//! Used when no message broker is configured. Nothing is retained per event.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use crate::domain::events::CheckoutEvent;
use crate::ports::{EventPublisher, PortError};

#[derive(Debug, Default)]
pub struct LogPublisher {
    published: AtomicU64,
}

impl LogPublisher {
    pub fn new() -> Self { Self::default() }

    /// Events logged since startup.
    pub fn published(&self) -> u64 { self.published.load(Ordering::Relaxed) }
}

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &CheckoutEvent) -> Result<(), PortError> {
        let payload = serde_json::to_string(event).map_err(|e| PortError::Messaging(e.to_string()))?;
        info!(subject = event.subject(), sale_id = event.sale_id(), %payload, "checkout event");
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
