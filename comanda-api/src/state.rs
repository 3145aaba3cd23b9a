use comanda_catalog::PricingConfig;
use comanda_order::OrderLifecycleService;
use comanda_store::BroadcastPublisher;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderLifecycleService>,
    /// Current restaurant pricing. Each checkout takes a snapshot.
    pub pricing: Arc<RwLock<PricingConfig>>,
    pub events: BroadcastPublisher,
}

impl AppState {
    pub async fn pricing_snapshot(&self) -> PricingConfig {
        self.pricing.read().await.clone()
    }
}
