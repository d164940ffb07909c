//! Postgres-backed catalog, sales and operational orders.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::domain::aggregates::{CatalogProduct, OperationalOrder};
use crate::ports::{Catalog, OperationalOrderGateway, PortError, SaleGateway, SaleItemGateway, SaleLineSummary, SalePayload, SaleReceipt};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl Catalog for PgStore {
    async fn get_product(&self, id: &str) -> Result<CatalogProduct, PortError> {
        sqlx::query_as::<_, CatalogProduct>("SELECT id, sku, name, base_price, stock, barcode FROM products WHERE id = $1 AND status = 'active'")
            .bind(id).fetch_optional(&self.pool).await?
            .ok_or_else(|| PortError::NotFound(format!("product {id}")))
    }

    /// Single statement, so concurrent checkouts cannot interleave a read and a write.
    async fn decrement_stock(&self, id: &str, quantity: u32) -> Result<u32, PortError> {
        let row: Option<(i32,)> = sqlx::query_as("UPDATE products SET stock = GREATEST(stock - $2, 0), updated_at = NOW() WHERE id = $1 RETURNING stock")
            .bind(id).bind(i32::try_from(quantity).unwrap_or(i32::MAX))
            .fetch_optional(&self.pool).await?;
        let (stock,) = row.ok_or_else(|| PortError::NotFound(format!("product {id}")))?;
        Ok(u32::try_from(stock).unwrap_or(0))
    }
}

#[async_trait]
impl SaleGateway for PgStore {
    async fn submit_sale(&self, payload: &SalePayload) -> Result<SaleReceipt, PortError> {
        let sale_id = Uuid::now_v7().to_string();
        let (folio,): (String,) = sqlx::query_as(
            "INSERT INTO sales (id, branch_id, customer_id, rep_id, subtotal, products_tax, services_tax, services_total, discount, total, payment_method, payment_reference, logistics, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW()) RETURNING folio")
            .bind(&sale_id).bind(&payload.context.branch_id).bind(&payload.context.customer_id).bind(&payload.context.rep_id)
            .bind(payload.totals.subtotal).bind(payload.totals.products_tax).bind(payload.totals.services_tax)
            .bind(payload.totals.services_total).bind(payload.totals.discount).bind(payload.totals.total)
            .bind(payload.payment_method.as_str()).bind(&payload.payment_reference).bind(Json(&payload.logistics))
            .fetch_one(&self.pool).await?;
        debug!(%sale_id, %folio, "sale inserted");
        Ok(SaleReceipt { sale_id, folio })
    }
}

#[async_trait]
impl SaleItemGateway for PgStore {
    async fn submit_sale_items(&self, sale_id: &str, lines: &[SaleLineSummary]) -> Result<(), PortError> {
        let mut tx = self.pool.begin().await?;
        for line in lines {
            sqlx::query("INSERT INTO sale_items (id, sale_id, kind, product_id, name, quantity, unit_price, subtotal, tax, total) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
                .bind(Uuid::now_v7()).bind(sale_id).bind(&line.kind).bind(&line.product_id).bind(&line.name)
                .bind(i32::try_from(line.quantity).unwrap_or(i32::MAX)).bind(line.unit_price).bind(line.subtotal).bind(line.tax).bind(line.total)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OperationalOrderGateway for PgStore {
    async fn save_orders(&self, orders: &[OperationalOrder]) -> Result<Vec<String>, PortError> {
        let mut tx = self.pool.begin().await?;
        for order in orders {
            sqlx::query("INSERT INTO operational_orders (id, sale_id, sale_folio, order_type, status, payload, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
                .bind(&order.id).bind(&order.sale_id).bind(&order.sale_folio).bind(order.order_type().as_str()).bind(order.status.as_str())
                .bind(Json(order)).bind(order.created_at)
                .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(orders.iter().map(|o| o.id.clone()).collect())
    }
}
