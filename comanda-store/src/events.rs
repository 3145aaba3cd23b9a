use async_trait::async_trait;
use comanda_core::EventPublisher;
use comanda_shared::LifecycleEvent;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// In-process fan-out of lifecycle events.
///
/// Every subscriber gets its own copy. Publishing with nobody listening is
/// not an error, the event is dropped.
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: LifecycleEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let topic = event.topic();
        let key = event.order_id();

        match self.sender.send(event) {
            Ok(receivers) => {
                info!("Sent {} for order {} to {} subscriber(s)", topic, key, receivers);
            }
            Err(_) => {
                debug!("No subscribers for {}, dropping event for order {}", topic, key);
            }
        }
        Ok(())
    }
}
