//! Printable sale ticket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::{Cart, Totals};
use crate::domain::pricing::split_tax_inclusive;
use crate::domain::value_objects::format_money;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TicketItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default, alias = "price")]
    pub unit_price: f64,
    #[serde(default)]
    pub total: Option<f64>,
}

impl TicketItem {
    pub fn line_total(&self) -> f64 { self.total.unwrap_or(self.unit_price * f64::from(self.quantity)) }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TicketRequest {
    pub sale_id: String,
    pub sale_number: String,
    pub total: f64,
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub tax: Option<f64>,
    pub payment_method: String,
    #[serde(default)]
    pub amount_received: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub items: Vec<TicketItem>,
    #[serde(default)]
    pub is_demo: bool,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub html: String,
}

#[derive(Debug, Clone)]
pub struct TicketLayout {
    pub organization_name: String,
    pub footer: Option<String>,
}

impl Default for TicketLayout {
    fn default() -> Self {
        Self { organization_name: "OpenSASE POS".to_string(), footer: Some("Thank you for your purchase".to_string()) }
    }
}

impl TicketRequest {
    /// Snapshot of a cart at checkout, with explicit subtotal and tax.
    pub fn from_cart(sale_id: &str, folio: &str, cart: &Cart, totals: &Totals, payment_method: &str) -> Self {
        Self {
            sale_id: sale_id.to_string(),
            sale_number: folio.to_string(),
            total: totals.total,
            subtotal: Some(totals.total - totals.tax()),
            tax: Some(totals.tax()),
            payment_method: payment_method.to_string(),
            items: cart.items().iter().map(|i| TicketItem {
                name: i.name().to_string(), quantity: i.quantity(), unit_price: i.unit_price(), total: Some(i.pricing().total),
            }).collect(),
            issued_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn with_cash(mut self, amount_received: Option<f64>) -> Self {
        if let Some(received) = amount_received {
            self.amount_received = Some(received);
            self.change = Some((received - self.total).max(0.0));
        }
        self
    }

    /// Subtotal and tax, reverse-derived from the grand total when either is missing.
    pub fn breakdown(&self) -> (f64, f64) {
        match (self.subtotal, self.tax) {
            (Some(subtotal), Some(tax)) => (subtotal, tax),
            _ => split_tax_inclusive(self.total),
        }
    }

    /// Query pairs understood by the ticket endpoint.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("saleId", self.sale_id.clone()),
            ("saleNumber", self.sale_number.clone()),
            ("total", self.total.to_string()),
            ("paymentMethod", self.payment_method.clone()),
        ];
        if let Some(received) = self.amount_received { pairs.push(("amountReceived", received.to_string())); }
        if let Some(change) = self.change { pairs.push(("change", change.to_string())); }
        if let Ok(items) = serde_json::to_string(&self.items) { pairs.push(("items", items)); }
        pairs
    }
}

/// Absolute ticket link under `base_url`, or `None` when the base is not a valid URL.
pub fn ticket_url(base_url: &str, request: &TicketRequest) -> Option<String> {
    let base = format!("{}/api/ticket", base_url.trim_end_matches('/'));
    reqwest::Url::parse_with_params(&base, request.query_pairs()).ok().map(String::from)
}

fn esc(input: &str) -> String {
    input.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn line(label: &str, value: &str) -> String {
    format!("<div class=\"line\"><span>{}</span><span>{}</span></div>", esc(label), esc(value))
}

pub fn render_ticket(request: &TicketRequest, layout: &TicketLayout) -> Ticket {
    let (subtotal, tax) = request.breakdown();

    let mut body = format!("<div class=\"center\"><strong>{}</strong></div>", esc(&layout.organization_name));
    if request.is_demo {
        body.push_str("<div class=\"center note\">OFFLINE SALE - pending sync</div>");
    }
    body.push_str("<div class=\"section\">");
    body.push_str(&line("Folio", &request.sale_number));
    if let Some(issued_at) = request.issued_at {
        body.push_str(&line("Date", &issued_at.format("%Y-%m-%d %H:%M").to_string()));
    }
    body.push_str("</div><div class=\"section\">");
    for item in &request.items {
        body.push_str(&line(&format!("{} x {}", item.quantity, item.name), &format_money(item.line_total())));
    }
    body.push_str("</div><div class=\"section\">");
    body.push_str(&line("Subtotal", &format_money(subtotal)));
    body.push_str(&line("IVA", &format_money(tax)));
    body.push_str(&line("Total", &format_money(request.total)));
    body.push_str("</div><div class=\"section\">");
    body.push_str(&line("Payment", &request.payment_method));
    if let Some(received) = request.amount_received { body.push_str(&line("Received", &format_money(received))); }
    if let Some(change) = request.change { body.push_str(&line("Change", &format_money(change))); }
    body.push_str("</div>");
    if let Some(footer) = &layout.footer {
        body.push_str(&format!("<div class=\"center note\">{}</div>", esc(footer)));
    }

    Ticket { subtotal, tax, total: request.total, html: html_shell(&format!("Ticket {}", request.sale_number), &body) }
}

fn html_shell(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="UTF-8"/>
<title>{}</title>
<style>
body {{ font-family: ui-monospace, SFMono-Regular, Menlo, monospace; margin: 0; padding: 12px; width: 72mm; color: #111; }}
.line {{ display: flex; justify-content: space-between; gap: 8px; font-size: 11px; }}
.section {{ margin-top: 8px; border-top: 1px dashed #111; padding-top: 6px; }}
.note {{ color: #666; font-size: 9px; }}
.center {{ text-align: center; }}
@media print {{ body {{ padding: 0; }} }}
</style>
</head>
<body>{}</body>
</html>"#,
        esc(title),
        body
    )
}
