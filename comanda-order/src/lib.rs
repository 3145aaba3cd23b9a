pub mod error;
pub mod finance;
pub mod history;
pub mod manager;
pub mod models;
pub mod repository;
pub mod state_machine;

pub use error::{LifecycleError, LifecycleResult};
pub use finance::{PaymentError, PaymentReconciler, PaymentRequest};
pub use history::{replay, OrderHistoryEntry};
pub use manager::{AvailableTransitions, LifecycleConfig, NewOrder, OrderLifecycleService, PaymentReceipt};
pub use models::{Customer, LineItem, Order, OrderType, PaymentRecord};
pub use repository::{InMemoryOrderRepository, OrderRepository, RepositoryError};
pub use state_machine::{OrderState, OrderStateMachine, TransitionRejection, TRANSITION_TABLE};
