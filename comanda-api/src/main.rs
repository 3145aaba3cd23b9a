use anyhow::Context;
use comanda_api::{app, AppState};
use comanda_order::{InMemoryOrderRepository, OrderRepository};
use comanda_store::{Config, DbClient, StoreOrderRepository};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "comanda_api=debug,comanda_order=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    config.pricing.validate().context("Invalid pricing config")?;
    config.lifecycle.validate().context("Invalid lifecycle config")?;
    tracing::info!("Starting Comanda API on port {}", config.server.port);

    let (repo, pricing) = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            let pricing = db
                .fetch_pricing(config.pricing.clone())
                .await
                .context("Failed to load restaurant pricing")?;
            let repo: Arc<dyn OrderRepository> = Arc::new(StoreOrderRepository::new(db.pool.clone()));
            (repo, pricing)
        }
        None => {
            tracing::warn!("No database configured, orders are kept in memory");
            let repo: Arc<dyn OrderRepository> = Arc::new(InMemoryOrderRepository::new());
            (repo, config.pricing.clone())
        }
    };

    let app = app(AppState::new(repo, pricing, config.lifecycle.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
