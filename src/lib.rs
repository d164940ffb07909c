//! OpenSASE POS checkout
//!
//! Cart pricing, pre-checkout validation and checkout orchestration for a
//! retail point of sale.
//!
//! ## Features
//! - Tax-inclusive cart totals over product, service and fabrication lines
//! - Live validation of stock, fabrication metadata and logistics
//! - Checkout that keeps the cashier moving when the backend is down
//! - Local draft of the open cart with a 24 hour lifetime
//! - Printable sale tickets

use thiserror::Error;

pub mod adapters;
pub mod api;
pub mod checkout;
pub mod config;
pub mod domain;
pub mod draft;
pub mod ports;
pub mod resilient;
pub mod session;
pub mod ticket;

pub use checkout::{Checkout, CheckoutOutcome, Collaborators, PaymentRequest, SaleResponse};
pub use domain::aggregates::{Cart, CatalogProduct, FabricationDetails, LineItem, LineKind, OperationalOrder, Totals};
pub use domain::logistics::{LogisticsDetails, ServiceToggles};
pub use domain::validation::{validate, ValidationReport};
pub use domain::value_objects::{LineId, PaymentMethod, ServiceType, TAX_RATE};
pub use session::{CheckoutSession, CheckoutState};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CheckoutError {
    #[error("Checkout validation failed: {}", .0.errors.join("; "))]
    Validation(ValidationReport),

    #[error("Malformed checkout: {0}")]
    Malformed(String),

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock { product_id: String, requested: u32, available: u32 },

    #[error(transparent)]
    Cart(#[from] domain::aggregates::CartError),

    #[error(transparent)]
    Port(#[from] ports::PortError),
}

pub type Result<T> = std::result::Result<T, CheckoutError>;
