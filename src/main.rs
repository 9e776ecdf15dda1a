// src/main.rs

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod error;
mod models;
mod notify;
mod routes;
mod services;
mod store;

use config::Settings;
use notify::{LogTransport, Outbox, Transport, WebhookTransport};
use services::Engine;
use store::PgStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment from .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("civicflow_api=info,tower_http=info")),
        )
        .init();

    let settings = Arc::new(Settings::from_env()?);

    // Initialize DB pool
    let pool = db::connect(&settings).await?;
    db::migrate(&pool).await?;

    let transport: Arc<dyn Transport> = match &settings.notify_webhook_url {
        Some(url) => Arc::new(WebhookTransport::new(url.clone())?),
        None => {
            tracing::warn!("NOTIFY_WEBHOOK_URL not set; notifications are only logged");
            Arc::new(LogTransport)
        }
    };
    let (outbox, rx) = Outbox::channel();
    notify::spawn_delivery(rx, transport);

    let engine = Engine::new(Arc::new(PgStore::new(pool)), outbox, settings.clone());
    engine.spawn_escalation();
    engine.spawn_overdue_monitor();

    let api = routes::router(AppState { engine });

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API listening");

    axum::serve(listener, api.into_make_service()).await?;
    Ok(())
}
