pub mod events;
pub mod identity;
pub mod payment;

pub use events::{EventPublisher, TracingPublisher};
pub use identity::{Actor, Role};
pub use payment::{Money, PaymentMethod, TipInput};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
}
