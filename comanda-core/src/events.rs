use async_trait::async_trait;
use comanda_shared::LifecycleEvent;

/// Sink for lifecycle notifications consumed by reporting collaborators.
///
/// Publishing happens after the order change is committed. A failing
/// publisher never rolls back an order.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        event: LifecycleEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Writes every event to the log and nothing else
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(
        &self,
        event: LifecycleEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        tracing::info!(
            order_id = %event.order_id(),
            topic = event.topic(),
            "Lifecycle event"
        );
        Ok(())
    }
}
