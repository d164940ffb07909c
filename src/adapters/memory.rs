//! In-process collaborators.
//!
//! Used when no database is configured, as the local fallback for operational
//! orders, and by tests (each has a switch to simulate an unavailable backend).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::{CatalogProduct, OperationalOrder};
use crate::domain::events::CheckoutEvent;
use crate::ports::{Catalog, EventPublisher, OperationalOrderGateway, PortError, SaleGateway, SaleItemGateway, SaleLineSummary, SalePayload, SaleReceipt};

fn check_online(offline: &AtomicBool, what: &str) -> Result<(), PortError> {
    if offline.load(Ordering::SeqCst) { Err(PortError::Unavailable(format!("{what} offline"))) } else { Ok(()) }
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<String, CatalogProduct>>,
    failing: RwLock<HashSet<String>>,
    offline: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn with_products(products: impl IntoIterator<Item = CatalogProduct>) -> Self {
        let catalog = Self::new();
        for p in products { catalog.upsert(p); }
        catalog
    }

    pub fn upsert(&self, product: CatalogProduct) { self.products.write().insert(product.id.clone(), product); }
    pub fn stock_of(&self, id: &str) -> Option<u32> { self.products.read().get(id).map(CatalogProduct::on_hand) }
    pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }

    /// Makes stock writes for one product fail while the others keep working.
    pub fn fail_decrements_for(&self, id: &str) { self.failing.write().insert(id.to_string()); }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, id: &str) -> Result<CatalogProduct, PortError> {
        check_online(&self.offline, "catalog")?;
        self.products.read().get(id).cloned().ok_or_else(|| PortError::NotFound(format!("product {id}")))
    }

    async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<u32, PortError> {
        check_online(&self.offline, "catalog")?;
        if self.failing.read().contains(id) { return Err(PortError::Unavailable(format!("stock write for {id}"))); }
        let mut products = self.products.write();
        let product = products.get_mut(id).ok_or_else(|| PortError::NotFound(format!("product {id}")))?;
        let remaining = product.on_hand().saturating_sub(quantity);
        product.stock = i32::try_from(remaining).unwrap_or(i32::MAX);
        Ok(remaining)
    }
}

/// Sales and their items, with sequential folios.
#[derive(Debug, Default)]
pub struct InMemorySales {
    sales: RwLock<Vec<(SaleReceipt, SalePayload)>>,
    items: RwLock<HashMap<String, Vec<SaleLineSummary>>>,
    next_folio: AtomicU64,
    offline: AtomicBool,
    items_offline: AtomicBool,
}

impl InMemorySales {
    pub fn new() -> Self { Self::default() }
    pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }
    pub fn set_items_offline(&self, offline: bool) { self.items_offline.store(offline, Ordering::SeqCst); }
    pub fn sale_count(&self) -> usize { self.sales.read().len() }
    pub fn sales(&self) -> Vec<(SaleReceipt, SalePayload)> { self.sales.read().clone() }
    pub fn items_for(&self, sale_id: &str) -> Vec<SaleLineSummary> { self.items.read().get(sale_id).cloned().unwrap_or_default() }
}

#[async_trait]
impl SaleGateway for InMemorySales {
    async fn submit_sale(&self, payload: &SalePayload) -> Result<SaleReceipt, PortError> {
        check_online(&self.offline, "sales")?;
        let n = self.next_folio.fetch_add(1, Ordering::SeqCst) + 1;
        let receipt = SaleReceipt { sale_id: Uuid::now_v7().to_string(), folio: format!("V-{n:06}") };
        self.sales.write().push((receipt.clone(), payload.clone()));
        debug!(folio = %receipt.folio, "sale stored in memory");
        Ok(receipt)
    }
}

#[async_trait]
impl SaleItemGateway for InMemorySales {
    async fn submit_sale_items(&self, sale_id: &str, lines: &[SaleLineSummary]) -> Result<(), PortError> {
        check_online(&self.items_offline, "sale items")?;
        self.items.write().entry(sale_id.to_string()).or_default().extend_from_slice(lines);
        Ok(())
    }
}

/// Operational orders keyed by sale id.
#[derive(Debug, Default)]
pub struct InMemoryOperationalOrders {
    orders: RwLock<HashMap<String, Vec<OperationalOrder>>>,
    offline: AtomicBool,
}

impl InMemoryOperationalOrders {
    pub fn new() -> Self { Self::default() }
    pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst); }

    /// Local store path; never fails.
    pub fn store(&self, orders: &[OperationalOrder]) -> Vec<String> {
        let mut map = self.orders.write();
        for order in orders {
            map.entry(order.sale_id.clone()).or_default().push(order.clone());
        }
        orders.iter().map(|o| o.id.clone()).collect()
    }

    pub fn for_sale(&self, sale_id: &str) -> Vec<OperationalOrder> { self.orders.read().get(sale_id).cloned().unwrap_or_default() }
    pub fn len(&self) -> usize { self.orders.read().values().map(Vec::len).sum() }
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait]
impl OperationalOrderGateway for InMemoryOperationalOrders {
    async fn save_orders(&self, orders: &[OperationalOrder]) -> Result<Vec<String>, PortError> {
        check_online(&self.offline, "operational orders")?;
        Ok(self.store(orders))
    }
}

/// Keeps every published event for inspection. Grows without bound, so production uses
/// [`LogPublisher`](crate::adapters::LogPublisher) instead.
#[derive(Debug, Default)]
pub struct InMemoryEvents {
    events: RwLock<Vec<CheckoutEvent>>,
}

impl InMemoryEvents {
    pub fn new() -> Self { Self::default() }
    pub fn events(&self) -> Vec<CheckoutEvent> { self.events.read().clone() }
}

#[async_trait]
impl EventPublisher for InMemoryEvents {
    async fn publish(&self, event: &CheckoutEvent) -> Result<(), PortError> {
        self.events.write().push(event.clone());
        Ok(())
    }
}
