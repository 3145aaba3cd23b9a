use comanda_catalog::{PricingError, ProductError};
use comanda_core::Money;
use uuid::Uuid;

use crate::finance::PaymentError;
use crate::repository::RepositoryError;
use crate::state_machine::{OrderState, TransitionError, TransitionRejection};

/// Everything the lifecycle service can refuse. Nothing is retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: OrderState,
        to: OrderState,
        reason: TransitionRejection,
    },

    #[error("Delivery distance {distance_km} km exceeds coverage of {max_km} km")]
    OutOfCoverage { distance_km: f64, max_km: f64 },

    #[error("Delivery order requires a customer address")]
    MissingAddress,

    #[error("Delivery order requires the distance to the customer")]
    MissingDistance,

    #[error("Invalid delivery distance: {0}")]
    InvalidDistance(f64),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Invalid line item: {0}")]
    InvalidLineItem(String),

    #[error("Invalid customer: {0}")]
    InvalidCustomer(String),

    #[error("Invalid pricing: {0}")]
    InvalidPricing(String),

    #[error("Invalid lifecycle configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient payment: tendered {tendered}, total {total}")]
    InsufficientPayment { tendered: Money, total: Money },

    #[error("Order already paid: {0}")]
    AlreadyPaid(Uuid),

    #[error("Cash payment requires the tendered amount")]
    MissingTender,

    #[error("Invalid tip: {0}")]
    InvalidTip(String),

    #[error("Order is cancelled: {0}")]
    OrderCancelled(Uuid),

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order {0} was changed concurrently, reload and retry")]
    Conflict(Uuid),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl LifecycleError {
    /// Stable machine-readable code for API consumers
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::InvalidTransition { .. } => "INVALID_TRANSITION",
            LifecycleError::OutOfCoverage { .. } => "OUT_OF_COVERAGE",
            LifecycleError::MissingAddress => "MISSING_ADDRESS",
            LifecycleError::MissingDistance => "MISSING_DISTANCE",
            LifecycleError::InvalidDistance(_) => "INVALID_DISTANCE",
            LifecycleError::EmptyCart => "EMPTY_CART",
            LifecycleError::InvalidLineItem(_) => "INVALID_LINE_ITEM",
            LifecycleError::InvalidCustomer(_) => "INVALID_CUSTOMER",
            LifecycleError::InvalidPricing(_) => "INVALID_PRICING",
            LifecycleError::InvalidConfig(_) => "INVALID_CONFIG",
            LifecycleError::InsufficientPayment { .. } => "INSUFFICIENT_PAYMENT",
            LifecycleError::AlreadyPaid(_) => "ALREADY_PAID",
            LifecycleError::MissingTender => "MISSING_TENDER",
            LifecycleError::InvalidTip(_) => "INVALID_TIP",
            LifecycleError::OrderCancelled(_) => "ORDER_CANCELLED",
            LifecycleError::NotFound(_) => "NOT_FOUND",
            LifecycleError::Conflict(_) => "CONFLICT",
            LifecycleError::Storage(_) => "STORAGE",
        }
    }
}

impl From<TransitionError> for LifecycleError {
    fn from(err: TransitionError) -> Self {
        LifecycleError::InvalidTransition {
            from: err.from,
            to: err.to,
            reason: err.reason,
        }
    }
}

impl From<PricingError> for LifecycleError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::OutOfCoverage { distance_km, max_km } => {
                LifecycleError::OutOfCoverage { distance_km, max_km }
            }
            PricingError::InvalidDistance(distance_km) => LifecycleError::InvalidDistance(distance_km),
            err @ PricingError::InvalidConfig(_) => LifecycleError::InvalidPricing(err.to_string()),
        }
    }
}

impl From<ProductError> for LifecycleError {
    fn from(err: ProductError) -> Self {
        LifecycleError::InvalidLineItem(err.to_string())
    }
}

impl From<PaymentError> for LifecycleError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::AlreadyPaid(id) => LifecycleError::AlreadyPaid(id),
            PaymentError::InsufficientPayment { tendered, total } => {
                LifecycleError::InsufficientPayment { tendered, total }
            }
            PaymentError::MissingTender => LifecycleError::MissingTender,
            err @ PaymentError::InvalidTip { .. } => LifecycleError::InvalidTip(err.to_string()),
            // subtotal plus fee is bounded at creation, so only the tip can overflow
            err @ PaymentError::AmountOverflow(_) => LifecycleError::InvalidTip(err.to_string()),
        }
    }
}

impl From<RepositoryError> for LifecycleError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => LifecycleError::NotFound(id),
            RepositoryError::VersionConflict { order_id, .. } => LifecycleError::Conflict(order_id),
            other => LifecycleError::Storage(other.to_string()),
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
