use axum::{http::Method, routing::get, Json, Router};
use comanda_catalog::PricingConfig;
use comanda_order::{LifecycleConfig, OrderLifecycleService, OrderRepository};
use comanda_store::BroadcastPublisher;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod orders;
pub mod state;

pub use state::AppState;

const EVENT_CHANNEL_CAPACITY: usize = 256;

impl AppState {
    /// Wire the lifecycle service to `repo` and an in-process event channel
    pub fn new(repo: Arc<dyn OrderRepository>, pricing: PricingConfig, lifecycle: LifecycleConfig) -> Self {
        let events = BroadcastPublisher::new(EVENT_CHANNEL_CAPACITY);
        let service = OrderLifecycleService::new(repo, Arc::new(events.clone()), lifecycle);

        Self {
            service: Arc::new(service),
            pricing: Arc::new(RwLock::new(pricing)),
            events,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::USER_AGENT]);

    Router::new()
        .route("/health", get(health))
        .merge(orders::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
