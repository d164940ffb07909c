//! Checkout domain: pricing, cart, validation and derived orders.
pub mod aggregates;
pub mod events;
pub mod logistics;
pub mod pricing;
pub mod validation;
pub mod value_objects;
