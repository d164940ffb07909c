//! Session-scoped checkout state.
//!
//! One session owns one cart. Mutations mark the draft stale; [`CheckoutSession::flush_draft`]
//! writes it on the blocking pool.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;

use crate::domain::aggregates::{Cart, CartError, CatalogProduct, FabricationDetails, LineItem, QuantityChange, Totals};
use crate::domain::logistics::{LogisticsDetails, ServiceToggles};
use crate::domain::pricing::LinePricing;
use crate::domain::validation::{validate, ValidationReport};
use crate::domain::value_objects::{LineId, ServiceType};
use crate::draft::DraftPersistence;
use crate::CheckoutError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState { #[default] Idle, Validating, Submitting, Success, Failed }

#[derive(Debug)]
pub struct CheckoutSession {
    id: String,
    cart: Cart,
    logistics: LogisticsDetails,
    toggles: ServiceToggles,
    state: CheckoutState,
    drafts: Option<DraftPersistence>,
    dirty: bool,
}

/// Read model of a session for callers that render it.
#[derive(Debug, Serialize)]
pub struct SessionView<'a> {
    pub id: &'a str,
    pub state: CheckoutState,
    pub lines: Vec<LineView<'a>>,
    pub totals: Totals,
    pub logistics: &'a LogisticsDetails,
    pub toggles: ServiceToggles,
}

#[derive(Debug, Serialize)]
pub struct LineView<'a> {
    #[serde(flatten)]
    pub item: &'a LineItem,
    pub pricing: LinePricing,
}

impl CheckoutSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), cart: Cart::new(), logistics: LogisticsDetails::default(), toggles: ServiceToggles::default(), state: CheckoutState::Idle, drafts: None, dirty: false }
    }

    /// Starts a session, fully replacing its state with a live draft if one exists.
    pub fn restore(id: impl Into<String>, drafts: DraftPersistence) -> Self {
        let mut session = Self::new(id);
        if let Some(draft) = drafts.load() {
            session.cart = draft.cart;
            session.logistics = draft.logistics;
            session.toggles = draft.toggles;
        }
        session.drafts = Some(drafts);
        session
    }

    pub fn id(&self) -> &str { &self.id }
    pub fn cart(&self) -> &Cart { &self.cart }
    pub fn logistics(&self) -> &LogisticsDetails { &self.logistics }
    pub fn toggles(&self) -> ServiceToggles { self.toggles }
    pub fn state(&self) -> CheckoutState { self.state }
    pub fn totals(&self) -> Totals { self.cart.totals() }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            id: &self.id,
            state: self.state,
            lines: self.cart.items().iter().map(|item| LineView { item, pricing: item.pricing() }).collect(),
            totals: self.cart.totals(),
            logistics: &self.logistics,
            toggles: self.toggles,
        }
    }

    /// Routes out-of-stock products, or explicit pre-orders, to a fabrication line;
    /// otherwise refuses to reserve more than `on-hand - reserved`.
    pub fn add_product(&mut self, product: &CatalogProduct, quantity: u32, fabrication: Option<FabricationDetails>) -> Result<LineId, CheckoutError> {
        let id = match fabrication {
            Some(details) => self.cart.add_fabrication(product, quantity, details)?,
            None if !product.is_in_stock() => self.cart.add_fabrication(product, quantity, FabricationDetails::default())?,
            None => {
                let available = product.available(self.cart.reserved_stock(&product.id));
                if quantity > available {
                    return Err(CheckoutError::InsufficientStock { product_id: product.id.clone(), requested: quantity, available });
                }
                self.cart.add_product(product, quantity)?
            }
        };
        self.touch();
        Ok(id)
    }

    pub fn set_service(&mut self, service: ServiceType, enabled: bool) {
        self.toggles.set(service, enabled);
        if enabled { self.cart.add_service(service); } else { self.cart.remove_service(service); }
        self.touch();
    }

    pub fn update_quantity(&mut self, line: &LineId, delta: i64) -> Result<QuantityChange, CartError> {
        let change = self.cart.update_quantity(line, delta)?;
        if change != QuantityChange::Unchanged { self.touch(); }
        Ok(change)
    }

    /// Removing a service line also switches its toggle off.
    pub fn remove_item(&mut self, line: &LineId) -> Option<LineItem> {
        let removed = self.cart.remove_item(line)?;
        if let Some(service) = removed.service_type() { self.toggles.set(service, false); }
        self.touch();
        Some(removed)
    }

    pub fn set_fabrication_details(&mut self, line: &LineId, details: FabricationDetails) -> Result<(), CartError> {
        self.cart.set_fabrication_details(line, details)?;
        self.touch();
        Ok(())
    }

    pub fn set_logistics(&mut self, logistics: LogisticsDetails) {
        self.logistics = logistics;
        self.touch();
    }

    pub fn validate(&self) -> ValidationReport { self.validate_against(&self.known_stock()) }
    pub fn validate_against(&self, stock: &HashMap<String, u32>) -> ValidationReport { validate(&self.cart, &self.logistics, stock) }
    pub fn known_stock(&self) -> HashMap<String, u32> { self.cart.known_stock() }

    pub(crate) fn set_state(&mut self, state: CheckoutState) { self.state = state; }

    /// Clears everything after a successful checkout. The next flush empties the draft.
    pub(crate) fn complete(&mut self) {
        self.cart.clear();
        self.logistics = LogisticsDetails::default();
        self.toggles = ServiceToggles::default();
        self.dirty = true;
        self.state = CheckoutState::Success;
    }

    /// Whether the draft lags behind the session.
    pub fn has_unsaved_changes(&self) -> bool { self.dirty && self.drafts.is_some() }

    /// Writes the current snapshot to the draft store off the async executor.
    /// A failed write is logged and retried on the next flush.
    pub async fn flush_draft(&mut self) {
        if !self.has_unsaved_changes() { return; }
        let Some(drafts) = self.drafts.clone() else { return };
        let (cart, logistics, toggles) = (self.cart.clone(), self.logistics.clone(), self.toggles);
        match tokio::task::spawn_blocking(move || drafts.save(&cart, &logistics, toggles)).await {
            Ok(Ok(_)) => self.dirty = false,
            Ok(Err(e)) => warn!(session = %self.id, error = %e, "failed to save checkout draft"),
            Err(e) => warn!(session = %self.id, error = %e, "draft writer task failed"),
        }
    }

    /// Starting to edit again after a finished attempt returns the session to idle.
    fn touch(&mut self) {
        if matches!(self.state, CheckoutState::Success | CheckoutState::Failed) { self.state = CheckoutState::Idle; }
        self.dirty = true;
    }
}
