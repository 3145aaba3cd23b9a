use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Amount in the currency's smallest indivisible unit
pub type Money = i64;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::Transfer => "TRANSFER",
        }
    }

    /// Only cash hands back change
    pub fn requires_tender(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CASH" => Ok(PaymentMethod::Cash),
            "CARD" => Ok(PaymentMethod::Card),
            "TRANSFER" => Ok(PaymentMethod::Transfer),
            other => Err(CoreError::ValidationError(format!(
                "unknown payment method: {}",
                other
            ))),
        }
    }
}

/// Tip as handed over by the checkout screen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TipInput {
    /// Percentage of the product subtotal, e.g. `10.0` for 10%
    Percent(f64),
    /// Already computed amount
    Amount(Money),
}

impl TipInput {
    /// Resolve against the product subtotal. The delivery fee never takes part.
    pub fn resolve(&self, product_subtotal: Money) -> Result<Money, CoreError> {
        match *self {
            TipInput::Percent(pct) => {
                if !pct.is_finite() || pct < 0.0 {
                    return Err(CoreError::ValidationError(format!(
                        "tip percentage must be a non-negative number, got {}",
                        pct
                    )));
                }
                Ok((product_subtotal as f64 * pct / 100.0).round() as Money)
            }
            TipInput::Amount(amount) => Ok(amount),
        }
    }
}
