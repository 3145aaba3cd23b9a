pub mod models;
pub mod pii;

pub use models::events::{LifecycleEvent, OrderCreatedEvent, OrderPaidEvent, OrderStateChangedEvent};
pub use pii::Masked;
