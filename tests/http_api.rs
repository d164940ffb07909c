use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use serde_json::{json, Value};
use tower::ServiceExt;

use reqwest::Url;

use opensase_pos::adapters::{HttpOperationalOrders, InMemoryCatalog, InMemoryEvents, InMemoryOperationalOrders, InMemorySales};
use opensase_pos::api::{router, AppState};
use opensase_pos::domain::aggregates::{derive_operational_orders, OperationalOrder, OrderType};
use opensase_pos::draft::FileDraftStore;
use opensase_pos::ports::{OperationalOrderGateway, PortError};
use opensase_pos::{Cart, CatalogProduct, Checkout, CheckoutSession, Collaborators, LogisticsDetails, PaymentRequest, ServiceType};

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::with_products([
        CatalogProduct::new("p-1", "SKU-1", "Sofa", 1000.0, 3),
        CatalogProduct::new("p-9", "SKU-9", "Bookcase", 2500.0, 0),
    ]))
}

fn state_with(order_store: Arc<InMemoryOperationalOrders>) -> AppState {
    AppState::new(Checkout::new(Collaborators::in_memory(catalog())), order_store, None)
}

fn app_with(order_store: Arc<InMemoryOperationalOrders>) -> Router { router(state_with(order_store)) }

fn app() -> Router { app_with(Arc::new(InMemoryOperationalOrders::new())) }

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn assert_amount(value: &Value, expected: f64) {
    let actual = value.as_f64().unwrap();
    assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_cart_editing_flow() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/sessions/c1/products", Some(json!({"product_id": "p-1", "quantity": 2}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let line_id = body["line_id"].as_str().unwrap().to_string();
    assert_amount(&body["session"]["totals"]["total"], 2320.0);

    let (status, body) = send(&app, Method::PUT, "/api/v1/sessions/c1/services/delivery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_amount(&body["totals"]["total"], 2670.0);
    assert_eq!(body["toggles"]["delivery"], true);

    let (status, body) = send(&app, Method::PATCH, &format!("/api/v1/sessions/c1/lines/{line_id}"), Some(json!({"delta": 5}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["change"], "unchanged");

    let (status, body) = send(&app, Method::PATCH, &format!("/api/v1/sessions/c1/lines/{line_id}"), Some(json!({"delta": i64::MAX}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["change"], "unchanged");
    assert_eq!(body["session"]["lines"][0]["quantity"], 2);

    let (status, body) = send(&app, Method::PATCH, &format!("/api/v1/sessions/c1/lines/{line_id}"), Some(json!({"delta": -1}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_amount(&body["session"]["totals"]["total"], 1510.0);

    let (status, _) = send(&app, Method::PATCH, "/api/v1/sessions/c1/lines/nope", Some(json!({"delta": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::DELETE, "/api/v1/sessions/c1/services/delivery", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_amount(&body["totals"]["total"], 1160.0);
}

#[tokio::test]
async fn test_add_product_errors() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/api/v1/sessions/c2/products", Some(json!({"product_id": "missing"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, "/api/v1/sessions/c2/products", Some(json!({"product_id": "p-1", "quantity": 0}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/api/v1/sessions/c2/products", Some(json!({"product_id": "p-1", "quantity": 4}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("available 3"));

    let (status, _) = send(&app, Method::PUT, "/api/v1/sessions/c2/services/assembly", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_flow() {
    let state = state_with(Arc::new(InMemoryOperationalOrders::new()));
    let app = router(state.clone());
    send(&app, Method::POST, "/api/v1/sessions/c3/products", Some(json!({"product_id": "p-1", "quantity": 1}))).await;
    send(&app, Method::PUT, "/api/v1/sessions/c3/services/installation", None).await;

    let (status, body) = send(&app, Method::POST, "/api/v1/sessions/c3/validate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"].as_array().unwrap().len(), 4);

    let (status, body) = send(&app, Method::POST, "/api/v1/sessions/c3/checkout", Some(json!({"payment_method": "cash", "amount_received": 2000.0}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["valid"], false);

    let logistics = json!({
        "installation_address": "Calle 5 #12",
        "installation_contact_name": "Ana",
        "installation_contact_phone": "555-0101",
        "installation_date": "2026-11-05"
    });
    let (status, _) = send(&app, Method::PUT, "/api/v1/sessions/c3/logistics", Some(logistics)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, "/api/v1/sessions/c3/checkout", Some(json!({"payment_method": "cash", "amount_received": 2000.0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sale"]["success"], true);
    assert_eq!(body["sale"]["is_demo"], false);
    assert!(body["sale"]["installation_order_id"].is_string());
    assert_amount(&body["ticket"]["total"], 1740.0);

    // The finished session is released; reading it again shows a fresh, unheld one.
    assert_eq!(state.session_count(), 0);
    let (status, body) = send(&app, Method::GET, "/api/v1/sessions/c3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "idle");
    assert!(body["lines"].as_array().unwrap().is_empty());
    assert_eq!(state.session_count(), 0);
}

#[tokio::test]
async fn test_reading_unknown_sessions_does_not_hold_them() {
    let state = state_with(Arc::new(InMemoryOperationalOrders::new()));
    let app = router(state.clone());
    for n in 0..5 {
        let (status, _) = send(&app, Method::GET, &format!("/api/v1/sessions/visitor-{n}"), None).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(state.session_count(), 0);

    send(&app, Method::PUT, "/api/v1/sessions/kept/services/warranty", None).await;
    assert_eq!(state.session_count(), 1);
}

#[tokio::test]
async fn test_drafts_survive_a_restart_until_checkout() {
    let dir = tempfile::tempdir().unwrap();
    let state = || AppState::new(Checkout::new(Collaborators::in_memory(catalog())), Arc::new(InMemoryOperationalOrders::new()), Some(dir.path().to_path_buf()));
    let draft = FileDraftStore::for_session(dir.path(), "till-1");

    let app = router(state());
    let (status, _) = send(&app, Method::POST, "/api/v1/sessions/till-1/products", Some(json!({"product_id": "p-1"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(draft.path().exists());

    let restarted = router(state());
    let (_, body) = send(&restarted, Method::GET, "/api/v1/sessions/till-1", None).await;
    assert_eq!(body["lines"].as_array().unwrap().len(), 1);

    let (status, _) = send(&restarted, Method::POST, "/api/v1/sessions/till-1/checkout", Some(json!({"payment_method": "cash", "amount_received": 1200.0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!draft.path().exists());
}

#[tokio::test]
async fn test_out_of_stock_product_becomes_fabrication() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/sessions/c4/products", Some(json!({"product_id": "p-9"}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let line_id = body["line_id"].as_str().unwrap().to_string();
    assert_eq!(body["session"]["lines"][0]["kind"], "fabrication");

    let details = json!({"promised_date": "2026-12-01", "advance_payment": 500.0, "advance_required": true});
    let (status, _) = send(&app, Method::PUT, &format!("/api/v1/sessions/c4/lines/{line_id}/fabrication"), Some(details)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::POST, "/api/v1/sessions/c4/validate", None).await;
    assert_eq!(body["valid"], true);
}

#[tokio::test]
async fn test_ticket_page() {
    let app = app();
    let items = r#"[{"name":"Sofa","quantity":1,"price":1160}]"#;
    let url = Url::parse_with_params("http://localhost/api/ticket", &[
        ("saleId", "s-1"), ("saleNumber", "V-000007"), ("total", "1160"), ("paymentMethod", "cash"),
        ("amountReceived", "1200"), ("change", "40"), ("items", items),
    ]).unwrap();
    let uri = format!("{}?{}", url.path(), url.query().unwrap_or_default());
    let resp = app.clone().oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(html.contains("V-000007"));
    assert!(html.contains("$1000.00"));
    assert!(html.contains("$160.00"));
    assert!(html.contains("$40.00"));

    let (status, _) = send(&app, Method::GET, "/api/ticket?saleId=s&saleNumber=V&total=1&paymentMethod=cash&items=oops", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Serves the router on an ephemeral port and returns the operational-order endpoint.
async fn serve(order_store: Arc<InMemoryOperationalOrders>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app_with(order_store);
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}/api/operational-orders")
}

fn delivery_logistics() -> LogisticsDetails {
    LogisticsDetails {
        delivery_address: Some("Av. Reforma 100".into()),
        delivery_date: NaiveDate::from_ymd_opt(2026, 11, 2),
        ..Default::default()
    }
}

fn delivery_orders(sale_id: &str) -> Vec<OperationalOrder> {
    let mut cart = Cart::new();
    cart.add_product(&CatalogProduct::new("p-1", "SKU-1", "Sofa", 1000.0, 3), 1).unwrap();
    cart.add_service(ServiceType::Delivery);
    derive_operational_orders(&cart, &delivery_logistics(), sale_id, "V-000001")
}

#[tokio::test]
async fn test_http_operational_orders_round_trip() {
    let store = Arc::new(InMemoryOperationalOrders::new());
    let endpoint = serve(store.clone()).await;

    let orders = delivery_orders("sale-1");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_type(), OrderType::Delivery);

    let client = HttpOperationalOrders::new(endpoint).unwrap();
    let ids = client.save_orders(&orders).await.unwrap();
    assert_eq!(ids, vec![orders[0].id.clone()]);
    assert_eq!(store.for_sale("sale-1"), orders);
}

#[tokio::test]
async fn test_rejected_remote_orders_fall_back_to_local_store() {
    let remote = Arc::new(InMemoryOperationalOrders::new());
    remote.set_offline(true);
    let endpoint = serve(remote.clone()).await;

    let client = Arc::new(HttpOperationalOrders::new(endpoint).unwrap());
    let err = client.save_orders(&delivery_orders("sale-2")).await.unwrap_err();
    assert!(matches!(err, PortError::Rejected(_)), "{err}");

    let sales = Arc::new(InMemorySales::new());
    let local_orders = Arc::new(InMemoryOperationalOrders::new());
    let checkout = Checkout::new(Collaborators {
        catalog: catalog(),
        sales: sales.clone(),
        sale_items: sales,
        orders: client,
        local_orders: local_orders.clone(),
        events: Arc::new(InMemoryEvents::new()),
    });
    let mut session = CheckoutSession::new("remote-down");
    session.add_product(&CatalogProduct::new("p-1", "SKU-1", "Sofa", 1000.0, 3), 1, None).unwrap();
    session.set_service(ServiceType::Delivery, true);
    session.set_logistics(delivery_logistics());

    let outcome = checkout.run(&mut session, &PaymentRequest::cash(1600.0)).await.unwrap();
    let resp = &outcome.response;
    assert!(resp.success);
    assert!(resp.orders_stored_locally);
    assert!(resp.shipping_order_id.is_some());
    assert_eq!(local_orders.for_sale(&resp.sale_id).len(), 1);
    assert!(remote.is_empty());
}
