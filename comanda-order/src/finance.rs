use chrono::{DateTime, Utc};
use comanda_core::{Money, PaymentMethod, TipInput};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Order, PaymentRecord};

/// What the cashier (or the rider at the door) hands to checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    /// Cash handed over; ignored for card and transfer
    #[serde(default)]
    pub tendered: Option<Money>,
    #[serde(default)]
    pub tip: Option<TipInput>,
}

impl PaymentRequest {
    pub fn cash(tendered: Money) -> Self {
        Self {
            method: PaymentMethod::Cash,
            tendered: Some(tendered),
            tip: None,
        }
    }

    pub fn card() -> Self {
        Self {
            method: PaymentMethod::Card,
            tendered: None,
            tip: None,
        }
    }

    pub fn transfer() -> Self {
        Self {
            method: PaymentMethod::Transfer,
            tendered: None,
            tip: None,
        }
    }

    pub fn with_tip(mut self, tip: TipInput) -> Self {
        self.tip = Some(tip);
        self
    }
}

/// Splits a checkout into subtotal, delivery fee and tip, and works out change.
///
/// Pure: it reads the order and returns the record to store. Tips arrive
/// already computed against the product subtotal; the reconciler only
/// bounds them.
#[derive(Debug, Clone)]
pub struct PaymentReconciler {
    /// Largest accepted tip as a fraction of the product subtotal
    tip_ceiling_ratio: f64,
}

impl PaymentReconciler {
    pub fn new(tip_ceiling_ratio: f64) -> Self {
        Self { tip_ceiling_ratio }
    }

    pub fn tip_ceiling(&self, product_subtotal: Money) -> Money {
        (product_subtotal as f64 * self.tip_ceiling_ratio).round() as Money
    }

    pub fn collect_payment(
        &self,
        order: &Order,
        method: PaymentMethod,
        tendered: Option<Money>,
        tip: Option<Money>,
        now: DateTime<Utc>,
    ) -> Result<PaymentRecord, PaymentError> {
        if order.payment_method().is_some() {
            return Err(PaymentError::AlreadyPaid(order.id));
        }

        let tip = tip.unwrap_or(0);
        let ceiling = self.tip_ceiling(order.product_subtotal);
        if tip < 0 || tip > ceiling {
            return Err(PaymentError::InvalidTip { tip, ceiling });
        }

        let final_total = order
            .product_subtotal
            .checked_add(order.delivery_fee.unwrap_or(0))
            .and_then(|due| due.checked_add(tip))
            .ok_or(PaymentError::AmountOverflow(order.id))?;

        let (tendered_amount, change_owed) = if method.requires_tender() {
            let tendered = tendered.ok_or(PaymentError::MissingTender)?;
            if tendered < final_total {
                return Err(PaymentError::InsufficientPayment {
                    tendered,
                    total: final_total,
                });
            }
            (Some(tendered), tendered - final_total)
        } else {
            (None, 0)
        };

        Ok(PaymentRecord {
            method,
            tip,
            tendered_amount,
            change_owed,
            final_total,
            paid_at: now,
        })
    }
}

impl Default for PaymentReconciler {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaymentError {
    #[error("Order already paid: {0}")]
    AlreadyPaid(Uuid),

    #[error("Insufficient payment: tendered {tendered}, total {total}")]
    InsufficientPayment { tendered: Money, total: Money },

    #[error("Cash payment requires the tendered amount")]
    MissingTender,

    #[error("Tip {tip} outside accepted range 0..={ceiling}")]
    InvalidTip { tip: Money, ceiling: Money },

    #[error("Total for order {0} is too large")]
    AmountOverflow(Uuid),
}
