//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::CatalogProduct;
pub use order::{derive_operational_orders, OperationalOrder, OrderDetails, OrderStatus, OrderType};
pub use cart::{Cart, CartError, FabricationDetails, LineItem, LineKind, QuantityChange, Totals};
