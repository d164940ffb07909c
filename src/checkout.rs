//! Checkout orchestration.
//!
//! `Idle -> Validating -> Submitting -> Success | Failed`. Validation failures send
//! the session back to `Idle` before anything touches the network. Once submitting,
//! backend failures never fail the checkout: an unreachable sale store yields an
//! offline folio flagged `is_demo`, and every later step is best-effort.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::log::LogPublisher;
use crate::adapters::memory::{InMemoryCatalog, InMemoryOperationalOrders, InMemorySales};
use crate::domain::aggregates::{derive_operational_orders, Cart, LineItem, LineKind, OperationalOrder, OrderType, Totals};
use crate::domain::events::CheckoutEvent;
use crate::domain::validation::ValidationReport;
use crate::domain::value_objects::PaymentMethod;
use crate::ports::{Catalog, EventPublisher, OperationalOrderGateway, SaleContext, SaleGateway, SaleItemGateway, SaleLineSummary, SalePayload, SaleReceipt};
use crate::resilient::Resilient;
use crate::session::{CheckoutSession, CheckoutState};
use crate::ticket::{render_ticket, ticket_url, Ticket, TicketLayout, TicketRequest};
use crate::{CheckoutError, Result};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub amount_received: Option<f64>,
}

impl PaymentRequest {
    pub fn cash(amount_received: f64) -> Self {
        Self { payment_method: PaymentMethod::Cash, payment_reference: None, amount_received: Some(amount_received) }
    }

    pub fn card(reference: impl Into<String>) -> Self {
        Self { payment_method: PaymentMethod::Card, payment_reference: Some(reference.into()), amount_received: None }
    }
}

/// Terminal result of a checkout attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleResponse {
    pub success: bool,
    pub sale_id: String,
    pub folio: String,
    /// Set when the sale was not persisted and `folio` is a local stand-in.
    pub is_demo: bool,
    #[serde(default)]
    pub ticket_url: Option<String>,
    #[serde(default)]
    pub shipping_order_id: Option<String>,
    #[serde(default)]
    pub installation_order_id: Option<String>,
    #[serde(default)]
    pub fabrication_order_id: Option<String>,
    #[serde(default)]
    pub orders_stored_locally: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CheckoutOutcome {
    pub response: SaleResponse,
    pub ticket: Ticket,
    pub orders: Vec<OperationalOrder>,
}

#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub sales: Arc<dyn SaleGateway>,
    pub sale_items: Arc<dyn SaleItemGateway>,
    pub orders: Arc<dyn OperationalOrderGateway>,
    /// Where operational orders go when `orders` is unreachable.
    pub local_orders: Arc<InMemoryOperationalOrders>,
    pub events: Arc<dyn EventPublisher>,
}

impl Collaborators {
    pub fn in_memory(catalog: Arc<InMemoryCatalog>) -> Self {
        let sales = Arc::new(InMemorySales::new());
        Self {
            catalog,
            sales: sales.clone(),
            sale_items: sales,
            orders: Arc::new(InMemoryOperationalOrders::new()),
            local_orders: Arc::new(InMemoryOperationalOrders::new()),
            events: Arc::new(LogPublisher::new()),
        }
    }
}

#[derive(Clone)]
pub struct Checkout {
    collab: Collaborators,
    context: SaleContext,
    ticket_base_url: Option<String>,
    layout: TicketLayout,
}

impl Checkout {
    pub fn new(collab: Collaborators) -> Self {
        Self { collab, context: SaleContext::default(), ticket_base_url: None, layout: TicketLayout::default() }
    }

    pub fn with_context(mut self, context: SaleContext) -> Self { self.context = context; self }
    pub fn with_ticket_base_url(mut self, base: impl Into<String>) -> Self { self.ticket_base_url = Some(base.into()); self }

    pub fn catalog(&self) -> &Arc<dyn Catalog> { &self.collab.catalog }
    pub fn layout(&self) -> &TicketLayout { &self.layout }

    /// Pre-checkout validation against current catalog stock.
    pub async fn validate(&self, session: &CheckoutSession) -> ValidationReport {
        let stock = self.current_stock(session.cart()).await;
        session.validate_against(&stock)
    }

    pub async fn run(&self, session: &mut CheckoutSession, payment: &PaymentRequest) -> Result<CheckoutOutcome> {
        session.set_state(CheckoutState::Validating);
        let report = self.validate(session).await;
        if !report.is_valid() {
            session.set_state(CheckoutState::Idle);
            info!(session = session.id(), errors = report.errors.len(), "checkout blocked by validation");
            return Err(CheckoutError::Validation(report));
        }

        let totals = session.totals();
        if let Err(reason) = check_well_formed(session.cart(), &totals, payment) {
            session.set_state(CheckoutState::Failed);
            error!(session = session.id(), %reason, "malformed checkout");
            return Err(CheckoutError::Malformed(reason));
        }

        session.set_state(CheckoutState::Submitting);
        let lines = summarize_lines(session.cart());
        let payload = SalePayload {
            context: self.context.clone(),
            lines: lines.clone(),
            totals,
            payment_method: payment.payment_method,
            payment_reference: payment.payment_reference.clone(),
            logistics: session.logistics().clone(),
        };

        let sale = Resilient::attempt("submit sale", self.collab.sales.submit_sale(&payload)).await
            .or_degrade(|_| Some(offline_receipt()));
        let degraded = sale.is_degraded();
        let reason = sale.error().map(str::to_string);
        let receipt = sale.into_value().unwrap_or_else(offline_receipt);

        if degraded {
            error!(sale_id = %receipt.sale_id, folio = %receipt.folio, degraded = true, reason = ?reason, "sale not persisted, continuing with offline folio");
        } else {
            info!(sale_id = %receipt.sale_id, folio = %receipt.folio, total = totals.total, "sale submitted");
            if let Resilient::Err(e) = Resilient::attempt("submit sale items", self.collab.sale_items.submit_sale_items(&receipt.sale_id, &lines)).await {
                warn!(sale_id = %receipt.sale_id, error = %e, "sale items not recorded");
            }
            self.decrement_stock(&receipt.sale_id, session.cart()).await;
        }

        let orders = derive_operational_orders(session.cart(), session.logistics(), &receipt.sale_id, &receipt.folio);
        let orders_stored_locally = self.persist_orders(&receipt.sale_id, &orders).await;

        self.publish(CheckoutEvent::SaleCompleted { sale_id: receipt.sale_id.clone(), folio: receipt.folio.clone(), total: totals.total, degraded }).await;

        let ticket_request = TicketRequest {
            is_demo: degraded,
            ..TicketRequest::from_cart(&receipt.sale_id, &receipt.folio, session.cart(), &totals, payment.payment_method.as_str())
        }.with_cash(payment.amount_received);
        let ticket = render_ticket(&ticket_request, &self.layout);

        let order_id = |t: OrderType| orders.iter().find(|o| o.order_type() == t).map(|o| o.id.clone());
        let response = SaleResponse {
            success: true,
            sale_id: receipt.sale_id.clone(),
            folio: receipt.folio.clone(),
            is_demo: degraded,
            ticket_url: self.ticket_base_url.as_deref().and_then(|base| ticket_url(base, &ticket_request)),
            shipping_order_id: order_id(OrderType::Delivery),
            installation_order_id: order_id(OrderType::Installation),
            fabrication_order_id: order_id(OrderType::Fabrication),
            orders_stored_locally,
            error: reason,
        };

        session.complete();
        session.flush_draft().await;
        Ok(CheckoutOutcome { response, ticket, orders })
    }

    /// Stock per product line as the catalog reports it now. Products the catalog cannot
    /// answer for keep the figure captured when they were added.
    async fn current_stock(&self, cart: &Cart) -> HashMap<String, u32> {
        let mut stock = cart.known_stock();
        let mut ids: Vec<&str> = cart.items().iter().filter_map(LineItem::as_product).map(|p| p.product_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        let fresh = join_all(ids.iter().map(|id| Resilient::attempt("refresh stock", self.collab.catalog.get_product(id)))).await;
        for product in fresh.into_iter().filter_map(Resilient::into_value) {
            stock.insert(product.id.clone(), product.on_hand());
        }
        stock
    }

    /// One conditional decrement per product, run concurrently; each failure stays local to its product.
    async fn decrement_stock(&self, sale_id: &str, cart: &Cart) {
        let mut wanted: Vec<(String, u32)> = vec![];
        for line in cart.items().iter().filter_map(LineItem::as_product) {
            match wanted.iter_mut().find(|(id, _)| id == &line.product_id) {
                Some((_, qty)) => *qty += line.quantity,
                None => wanted.push((line.product_id.clone(), line.quantity)),
            }
        }

        let results = join_all(wanted.iter().map(|(id, qty)| Resilient::attempt("decrement stock", self.collab.catalog.decrement_stock(id, *qty)))).await;
        for ((product_id, quantity), result) in wanted.into_iter().zip(results) {
            match result {
                Resilient::Ok(remaining) => {
                    self.publish(CheckoutEvent::StockDecremented { sale_id: sale_id.to_string(), product_id, remaining }).await;
                }
                _ => warn!(sale_id, %product_id, quantity, "stock not decremented"),
            }
        }
    }

    /// Returns whether the orders had to be kept in the local store.
    async fn persist_orders(&self, sale_id: &str, orders: &[OperationalOrder]) -> bool {
        if orders.is_empty() { return false; }
        let outcome = Resilient::attempt("save operational orders", self.collab.orders.save_orders(orders)).await
            .or_degrade(|_| Some(self.collab.local_orders.store(orders)));
        let stored_locally = outcome.is_degraded();
        if stored_locally {
            warn!(sale_id, count = orders.len(), "operational orders kept in local store");
        }
        let order_ids = orders.iter().map(|o| o.id.clone()).collect();
        self.publish(CheckoutEvent::OperationalOrdersCreated { sale_id: sale_id.to_string(), order_ids, stored_locally }).await;
        stored_locally
    }

    async fn publish(&self, event: CheckoutEvent) {
        if let Resilient::Err(e) = Resilient::attempt("publish event", self.collab.events.publish(&event)).await {
            warn!(sale_id = event.sale_id(), subject = event.subject(), error = %e, "checkout event dropped");
        }
    }
}

fn offline_receipt() -> SaleReceipt {
    let id = Uuid::new_v4().simple().to_string();
    let suffix = id.get(..6).unwrap_or_default().to_uppercase();
    SaleReceipt { sale_id: format!("offline-{id}"), folio: format!("DEMO-{}-{suffix}", Utc::now().format("%Y%m%d%H%M%S")) }
}

fn check_well_formed(cart: &Cart, totals: &Totals, payment: &PaymentRequest) -> std::result::Result<(), String> {
    for item in cart.items() {
        let price = item.unit_price();
        if !price.is_finite() || price < 0.0 {
            return Err(format!("line {} has an invalid unit price {price}", item.id));
        }
        if item.quantity() == 0 {
            return Err(format!("line {} has zero quantity", item.id));
        }
    }
    if !totals.total.is_finite() {
        return Err("cart total is not a finite amount".to_string());
    }
    if let Some(received) = payment.amount_received {
        if !received.is_finite() || received < 0.0 {
            return Err(format!("invalid amount received {received}"));
        }
    }
    Ok(())
}

fn summarize_lines(cart: &Cart) -> Vec<SaleLineSummary> {
    cart.items().iter().map(|item| {
        let p = item.pricing();
        let kind = match &item.kind {
            LineKind::Product(_) => "product",
            LineKind::Service(_) => "service",
            LineKind::Fabrication(_) => "fabrication",
        };
        SaleLineSummary {
            kind: kind.to_string(),
            product_id: item.product_id().map(str::to_string),
            name: item.name().to_string(),
            quantity: item.quantity(),
            unit_price: item.unit_price(),
            subtotal: p.subtotal,
            tax: p.tax,
            total: p.total,
        }
    }).collect()
}
