//! Concrete collaborators behind the checkout ports.
pub mod http;
pub mod log;
pub mod memory;
pub mod nats;
pub mod postgres;

pub use http::HttpOperationalOrders;
pub use log::LogPublisher;
pub use memory::{InMemoryCatalog, InMemoryEvents, InMemoryOperationalOrders, InMemorySales};
pub use nats::NatsPublisher;
pub use postgres::PgStore;
