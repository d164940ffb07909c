//! HTTP surface: checkout sessions, the operational-order endpoint and printable tickets.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{extract::{Path, Query, State}, http::StatusCode, response::Html, routing::{get, patch, post, put}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use validator::Validate;

use crate::adapters::http::{SaveOrdersRequest, SaveOrdersResponse};
use crate::checkout::{Checkout, PaymentRequest};
use crate::domain::aggregates::{CartError, FabricationDetails};
use crate::domain::logistics::LogisticsDetails;
use crate::domain::validation::ValidationReport;
use crate::domain::value_objects::{LineId, ServiceType};
use crate::draft::{DraftPersistence, FileDraftStore};
use crate::ports::{OperationalOrderGateway, PortError};
use crate::session::CheckoutSession;
use crate::ticket::{render_ticket, TicketItem, TicketRequest};
use crate::CheckoutError;

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<Checkout>,
    /// Server-side store behind `POST /api/operational-orders`.
    pub order_store: Arc<dyn OperationalOrderGateway>,
    pub draft_dir: Option<PathBuf>,
    sessions: Arc<parking_lot::Mutex<HashMap<String, Arc<Mutex<CheckoutSession>>>>>,
}

impl AppState {
    pub fn new(checkout: Checkout, order_store: Arc<dyn OperationalOrderGateway>, draft_dir: Option<PathBuf>) -> Self {
        Self { checkout: Arc::new(checkout), order_store, draft_dir, sessions: Arc::default() }
    }

    /// Sessions currently held in memory.
    pub fn session_count(&self) -> usize { self.sessions.lock().len() }

    /// Existing session, or a new one restored from its draft and kept until it checks out.
    async fn session(&self, id: &str) -> ApiResult<Arc<Mutex<CheckoutSession>>> {
        let existing = self.sessions.lock().get(id).cloned();
        if let Some(handle) = existing { return Ok(handle); }
        let restored = self.restore(id).await?;
        Ok(self.sessions.lock().entry(id.to_string()).or_insert_with(|| Arc::new(Mutex::new(restored))).clone())
    }

    /// Reads the session's draft on the blocking pool.
    async fn restore(&self, id: &str) -> ApiResult<CheckoutSession> {
        let drafts = match &self.draft_dir {
            Some(dir) => DraftPersistence::new(Arc::new(FileDraftStore::for_session(dir, id))),
            None => DraftPersistence::in_memory(),
        };
        let id = id.to_string();
        tokio::task::spawn_blocking(move || CheckoutSession::restore(id, drafts)).await
            .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }

    fn forget(&self, id: &str) { self.sessions.lock().remove(id); }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "opensase-pos"})) }))
        .route("/api/v1/sessions/:id", get(get_session))
        .route("/api/v1/sessions/:id/products", post(add_product))
        .route("/api/v1/sessions/:id/services/:service", put(enable_service).delete(disable_service))
        .route("/api/v1/sessions/:id/lines/:line_id", patch(update_quantity).delete(remove_line))
        .route("/api/v1/sessions/:id/lines/:line_id/fabrication", put(set_fabrication))
        .route("/api/v1/sessions/:id/logistics", put(set_logistics))
        .route("/api/v1/sessions/:id/validate", post(validate_session))
        .route("/api/v1/sessions/:id/checkout", post(checkout))
        .route("/api/operational-orders", post(save_operational_orders))
        .route("/api/ticket", get(ticket))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({"success": false, "error": message.into()})))
}

fn checkout_error(e: CheckoutError) -> ApiError {
    match e {
        CheckoutError::Validation(report) => (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"success": false, "valid": false, "errors": report.errors}))),
        CheckoutError::Malformed(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        CheckoutError::InsufficientStock { .. } => api_error(StatusCode::CONFLICT, e.to_string()),
        CheckoutError::Cart(CartError::ItemNotFound) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        CheckoutError::Cart(_) => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        CheckoutError::Port(PortError::NotFound(_)) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        CheckoutError::Port(_) => api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

fn session_json(session: &CheckoutSession) -> ApiResult<Value> {
    serde_json::to_value(session.view()).map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Persists the draft after a mutation, then renders the session.
async fn saved_json(session: &mut CheckoutSession) -> ApiResult<Value> {
    session.flush_draft().await;
    session_json(session)
}

/// Reading a session that is not held in memory does not start holding it.
async fn get_session(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let existing = s.sessions.lock().get(&id).cloned();
    match existing {
        Some(handle) => Ok(Json(session_json(&*handle.lock().await)?)),
        None => Ok(Json(session_json(&s.restore(&id).await?)?)),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddProductRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 9999))]
    pub quantity: u32,
    #[serde(default)]
    pub fabrication: Option<FabricationDetails>,
}

fn one() -> u32 { 1 }

async fn add_product(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<AddProductRequest>) -> ApiResult<(StatusCode, Json<Value>)> {
    r.validate().map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let product = s.checkout.catalog().get_product(&r.product_id).await.map_err(|e| checkout_error(e.into()))?;
    let handle = s.session(&id).await?;
    let mut session = handle.lock().await;
    let line_id = session.add_product(&product, r.quantity, r.fabrication).map_err(checkout_error)?;
    Ok((StatusCode::CREATED, Json(json!({"line_id": line_id, "session": saved_json(&mut session).await?}))))
}

fn parse_service(raw: &str) -> ApiResult<ServiceType> {
    raw.parse().map_err(|e: crate::domain::value_objects::UnknownVariant| api_error(StatusCode::BAD_REQUEST, e.to_string()))
}

async fn enable_service(State(s): State<AppState>, Path((id, service)): Path<(String, String)>) -> ApiResult<Json<Value>> {
    let service = parse_service(&service)?;
    let handle = s.session(&id).await?;
    let mut session = handle.lock().await;
    session.set_service(service, true);
    Ok(Json(saved_json(&mut session).await?))
}

async fn disable_service(State(s): State<AppState>, Path((id, service)): Path<(String, String)>) -> ApiResult<Json<Value>> {
    let service = parse_service(&service)?;
    let handle = s.session(&id).await?;
    let mut session = handle.lock().await;
    session.set_service(service, false);
    Ok(Json(saved_json(&mut session).await?))
}

#[derive(Debug, Deserialize)]
pub struct QuantityRequest { pub delta: i64 }

async fn update_quantity(State(s): State<AppState>, Path((id, line_id)): Path<(String, String)>, Json(r): Json<QuantityRequest>) -> ApiResult<Json<Value>> {
    let handle = s.session(&id).await?;
    let mut session = handle.lock().await;
    let change = session.update_quantity(&LineId::from(line_id.as_str()), r.delta).map_err(|e| checkout_error(e.into()))?;
    Ok(Json(json!({"change": change, "session": saved_json(&mut session).await?})))
}

async fn remove_line(State(s): State<AppState>, Path((id, line_id)): Path<(String, String)>) -> ApiResult<Json<Value>> {
    let handle = s.session(&id).await?;
    let mut session = handle.lock().await;
    session.remove_item(&LineId::from(line_id.as_str())).ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Item not found"))?;
    Ok(Json(saved_json(&mut session).await?))
}

async fn set_fabrication(State(s): State<AppState>, Path((id, line_id)): Path<(String, String)>, Json(details): Json<FabricationDetails>) -> ApiResult<Json<Value>> {
    let handle = s.session(&id).await?;
    let mut session = handle.lock().await;
    session.set_fabrication_details(&LineId::from(line_id.as_str()), details).map_err(|e| checkout_error(e.into()))?;
    Ok(Json(saved_json(&mut session).await?))
}

async fn set_logistics(State(s): State<AppState>, Path(id): Path<String>, Json(logistics): Json<LogisticsDetails>) -> ApiResult<Json<Value>> {
    let handle = s.session(&id).await?;
    let mut session = handle.lock().await;
    session.set_logistics(logistics);
    Ok(Json(saved_json(&mut session).await?))
}

async fn validate_session(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<ValidationReport>> {
    let handle = s.session(&id).await?;
    let session = handle.lock().await;
    Ok(Json(s.checkout.validate(&session).await))
}

/// A session that checks out successfully is dropped from memory; its draft is already empty.
async fn checkout(State(s): State<AppState>, Path(id): Path<String>, Json(payment): Json<PaymentRequest>) -> ApiResult<Json<Value>> {
    let handle = s.session(&id).await?;
    let mut session = handle.lock().await;
    let outcome = s.checkout.run(&mut session, &payment).await.map_err(checkout_error)?;
    drop(session);
    s.forget(&id);
    Ok(Json(json!({"sale": outcome.response, "ticket": outcome.ticket, "orders": outcome.orders})))
}

async fn save_operational_orders(State(s): State<AppState>, Json(r): Json<SaveOrdersRequest>) -> (StatusCode, Json<SaveOrdersResponse>) {
    match s.order_store.save_orders(&r.orders).await {
        Ok(ids) => (StatusCode::OK, Json(SaveOrdersResponse { success: true, ids, error: None })),
        Err(e) => (StatusCode::BAD_GATEWAY, Json(SaveOrdersResponse { success: false, ids: vec![], error: Some(e.to_string()) })),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuery {
    pub sale_id: String,
    pub sale_number: String,
    pub total: f64,
    pub payment_method: String,
    pub amount_received: Option<f64>,
    pub change: Option<f64>,
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub items: Option<String>,
}

async fn ticket(State(s): State<AppState>, Query(q): Query<TicketQuery>) -> ApiResult<Html<String>> {
    let items: Vec<TicketItem> = match q.items.as_deref() {
        Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw).map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid items: {e}")))?,
        _ => vec![],
    };
    let request = TicketRequest {
        sale_id: q.sale_id, sale_number: q.sale_number, total: q.total, subtotal: q.subtotal, tax: q.tax,
        payment_method: q.payment_method, amount_received: q.amount_received, change: q.change, items,
        ..Default::default()
    };
    Ok(Html(render_ticket(&request, s.checkout.layout()).html))
}
