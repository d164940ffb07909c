//! Environment configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::ports::SaleContext;

const DEFAULT_PORT: u16 = 8084;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub operational_orders_url: Option<String>,
    pub ticket_base_url: Option<String>,
    pub draft_dir: Option<PathBuf>,
    pub sale_context: SaleContext,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid PORT value `{0}`")]
    InvalidPort(String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> { Self::from_lookup(|key| std::env::var(key).ok()) }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let port = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        Ok(Self {
            port,
            database_url: get("DATABASE_URL"),
            nats_url: get("NATS_URL"),
            operational_orders_url: get("OPERATIONAL_ORDERS_URL"),
            ticket_base_url: get("TICKET_BASE_URL"),
            draft_dir: get("DRAFT_DIR").map(PathBuf::from),
            sale_context: SaleContext {
                branch_id: get("DEFAULT_BRANCH_ID"),
                customer_id: get("WALK_IN_CUSTOMER_ID"),
                rep_id: get("SALES_REP_ID"),
            },
        })
    }
}
