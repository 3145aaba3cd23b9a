use chrono::{DateTime, Utc};
use comanda_catalog::{CartLine, Ingredient, ProductError};
use comanda_core::{Money, PaymentMethod};
use comanda_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::OrderState;

/// How the order reaches the customer. Fixed at creation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Pickup or dine-in
    Establishment,
    /// Domicilio: home delivery by a rider
    Delivery,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Establishment => "ESTABLISHMENT",
            OrderType::Delivery => "DELIVERY",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ESTABLISHMENT" => Ok(OrderType::Establishment),
            "DELIVERY" => Ok(OrderType::Delivery),
            other => Err(format!("unknown order type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub phone: Option<Masked<String>>,
    #[serde(default)]
    pub address: Option<Masked<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Customer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: None,
            address: None,
            notes: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(Masked::new(phone.into()));
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(Masked::new(address.into()));
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn has_address(&self) -> bool {
        self.address.as_ref().is_some_and(|a| !a.is_blank())
    }
}

/// A product as it was sold. Never edited once the order exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub selected_optional_ingredients: Vec<Ingredient>,
    pub required_ingredients: Vec<String>,
    pub subtotal: Money,
    pub note: Option<String>,
}

impl TryFrom<&CartLine> for LineItem {
    type Error = ProductError;

    fn try_from(line: &CartLine) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            unit_price: line.unit_price,
            quantity: line.quantity,
            selected_optional_ingredients: line.selected_optional_ingredients.clone(),
            required_ingredients: line.required_ingredients.clone(),
            subtotal: line.subtotal()?,
            note: line.note.clone(),
        })
    }
}

/// Sum of line subtotals, `None` on overflow
fn line_items_total(items: &[LineItem]) -> Option<Money> {
    items.iter().try_fold(0, |acc: Money, item| acc.checked_add(item.subtotal))
}

/// Result of the one-time payment collection step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub method: PaymentMethod,
    pub tip: Money,
    /// Only kept for cash
    pub tendered_amount: Option<Money>,
    pub change_owed: Money,
    pub final_total: Money,
    pub paid_at: DateTime<Utc>,
}

/// The single source of truth for a customer's purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_type: OrderType,
    pub state: OrderState,
    pub customer: Customer,
    pub line_items: Vec<LineItem>,
    pub product_subtotal: Money,
    /// Frozen at creation, delivery orders only
    pub delivery_fee: Option<Money>,
    pub distance_km: Option<f64>,
    pub payment: Option<PaymentRecord>,
    pub assigned_rider_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every committed change
    pub version: u64,
}

impl Order {
    /// Fails if the subtotal, or subtotal plus delivery fee, does not fit in [`Money`]
    pub fn new(
        order_type: OrderType,
        customer: Customer,
        line_items: Vec<LineItem>,
        delivery: Option<(f64, Money)>,
        now: DateTime<Utc>,
    ) -> Result<Self, ProductError> {
        let overflow = || ProductError::AmountOverflow("order total".to_string());
        let product_subtotal = line_items_total(&line_items).ok_or_else(overflow)?;
        product_subtotal
            .checked_add(delivery.map_or(0, |(_, fee)| fee))
            .ok_or_else(overflow)?;

        Ok(Self {
            id: Uuid::new_v4(),
            order_type,
            state: OrderState::Created,
            customer,
            line_items,
            product_subtotal,
            delivery_fee: delivery.map(|(_, fee)| fee),
            distance_km: delivery.map(|(km, _)| km),
            payment: None,
            assigned_rider_id: None,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    pub fn is_paid(&self) -> bool {
        self.payment.is_some()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment.as_ref().map(|p| p.method)
    }

    pub fn tip(&self) -> Option<Money> {
        self.payment.as_ref().map(|p| p.tip)
    }

    /// Subtotal plus delivery fee, before any tip
    pub fn amount_due(&self) -> Money {
        self.product_subtotal.saturating_add(self.delivery_fee.unwrap_or(0))
    }

    /// Check the structural invariants every committed order must satisfy
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let is_delivery = self.order_type == OrderType::Delivery;
        if self.delivery_fee.is_some() != is_delivery {
            violations.push(format!(
                "delivery fee presence does not match order type {}",
                self.order_type
            ));
        }

        match line_items_total(&self.line_items) {
            Some(expected) if expected == self.product_subtotal => {}
            Some(expected) => violations.push(format!(
                "product subtotal {} differs from line items {}",
                self.product_subtotal, expected
            )),
            None => violations.push("line item total overflows".to_string()),
        }

        let rider_expected = is_delivery
            && matches!(
                self.state,
                OrderState::Dispatched | OrderState::Arrived | OrderState::Delivered
            );
        if self.assigned_rider_id.is_some() != rider_expected {
            violations.push(format!(
                "assigned rider presence does not match state {}",
                self.state
            ));
        }

        violations
    }
}
