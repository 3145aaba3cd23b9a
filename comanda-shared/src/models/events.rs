use uuid::Uuid;

/// Published once when an order is accepted at checkout.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct OrderCreatedEvent {
    pub order_id: Uuid,
    pub order_type: String,
    pub product_subtotal: i64,
    pub delivery_fee: Option<i64>,
    pub distance_km: Option<f64>,
    pub actor_id: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct OrderStateChangedEvent {
    pub order_id: Uuid,
    pub from_state: String,
    pub to_state: String,
    pub actor_id: String,
    pub actor_role: String,
    pub assigned_rider_id: Option<String>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct OrderPaidEvent {
    pub order_id: Uuid,
    pub payment_method: String,
    pub product_subtotal: i64,
    pub delivery_fee: i64,
    pub tip: i64,
    pub final_total: i64,
    pub change_owed: i64,
    pub timestamp: i64,
}

/// Envelope for everything the lifecycle engine tells reporting collaborators.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleEvent {
    OrderCreated(OrderCreatedEvent),
    OrderStateChanged(OrderStateChangedEvent),
    OrderPaid(OrderPaidEvent),
}

impl LifecycleEvent {
    pub fn order_id(&self) -> Uuid {
        match self {
            LifecycleEvent::OrderCreated(e) => e.order_id,
            LifecycleEvent::OrderStateChanged(e) => e.order_id,
            LifecycleEvent::OrderPaid(e) => e.order_id,
        }
    }

    /// Topic-style name used as routing key by publishers
    pub fn topic(&self) -> &'static str {
        match self {
            LifecycleEvent::OrderCreated(_) => "orders.created",
            LifecycleEvent::OrderStateChanged(_) => "orders.state_changed",
            LifecycleEvent::OrderPaid(_) => "orders.paid",
        }
    }
}
