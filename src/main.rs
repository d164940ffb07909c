//! OpenSASE POS - checkout service

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_pos::adapters::{HttpOperationalOrders, InMemoryCatalog, InMemoryOperationalOrders, LogPublisher, NatsPublisher, PgStore};
use opensase_pos::api::{router, AppState};
use opensase_pos::config::Config;
use opensase_pos::ports::{EventPublisher, OperationalOrderGateway};
use opensase_pos::{Checkout, Collaborators};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let (mut collab, order_store): (Collaborators, Arc<dyn OperationalOrderGateway>) = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            let store = Arc::new(PgStore::new(db));
            let collab = Collaborators {
                catalog: store.clone(),
                sales: store.clone(),
                sale_items: store.clone(),
                orders: store.clone(),
                local_orders: Arc::new(InMemoryOperationalOrders::new()),
                events: Arc::new(LogPublisher::new()),
            };
            (collab, store as Arc<dyn OperationalOrderGateway>)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            let orders = Arc::new(InMemoryOperationalOrders::new());
            let mut collab = Collaborators::in_memory(Arc::new(InMemoryCatalog::new()));
            collab.orders = orders.clone();
            (collab, orders as Arc<dyn OperationalOrderGateway>)
        }
    };

    if let Some(url) = &config.operational_orders_url {
        collab.orders = Arc::new(HttpOperationalOrders::new(url.clone())?);
    }
    if let Some(url) = &config.nats_url {
        match NatsPublisher::connect(url).await {
            Ok(publisher) => collab.events = Arc::new(publisher) as Arc<dyn EventPublisher>,
            Err(e) => tracing::warn!(error = %e, "NATS unavailable, checkout events go to the log only"),
        }
    }

    let mut checkout = Checkout::new(collab).with_context(config.sale_context.clone());
    if let Some(base) = &config.ticket_base_url {
        checkout = checkout.with_ticket_base_url(base.clone());
    }
    if let Some(dir) = &config.draft_dir {
        tokio::fs::create_dir_all(dir).await?;
    }

    let app = router(AppState::new(checkout, order_store, config.draft_dir.clone()));
    tracing::info!("🚀 OpenSASE POS listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
