use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use comanda_catalog::{quote, DeliveryQuote};
use comanda_core::{Actor, Role};
use comanda_order::{NewOrder, Order, OrderHistoryEntry, OrderState, PaymentReceipt, PaymentRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub actor: Actor,
    #[serde(flatten)]
    pub order: NewOrder,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub actor: Actor,
    pub to: OrderState,
    #[serde(default)]
    pub note: Option<String>,
    /// Needed when delivering an order that is not paid yet
    #[serde(default)]
    pub payment: Option<PaymentRequest>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionQuery {
    pub actor_id: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct AvailableTransitionsResponse {
    pub order_id: Uuid,
    pub state: OrderState,
    pub targets: Vec<OrderState>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub distance_km: f64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub state_label: &'static str,
    pub amount_due: i64,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            state_label: order.state.label(),
            amount_due: order.amount_due(),
            order,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/history", get(get_history))
        .route("/v1/orders/{id}/transitions", get(available_transitions).post(advance_state))
        .route("/v1/orders/{id}/payment", post(collect_payment))
        .route("/v1/delivery/quote", post(delivery_quote))
}

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let pricing = state.pricing_snapshot().await;
    let order = state.service.create_order(req.order, &pricing, &req.actor).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /v1/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state.service.get_order(order_id).await?;
    Ok(Json(order.into()))
}

/// GET /v1/orders/:id/history
pub async fn get_history(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Vec<OrderHistoryEntry>>, AppError> {
    Ok(Json(state.service.history(order_id).await?))
}

/// GET /v1/orders/:id/transitions?actor_id=..&role=..
/// What the given actor can do next, for rendering buttons
pub async fn available_transitions(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Query(query): Query<TransitionQuery>,
) -> Result<Json<AvailableTransitionsResponse>, AppError> {
    if query.actor_id.trim().is_empty() {
        return Err(AppError::ValidationError("actor_id is required".to_string()));
    }
    let actor = Actor::new(query.actor_id, query.role);

    let available = state.service.available_transitions(order_id, &actor).await?;

    Ok(Json(AvailableTransitionsResponse {
        order_id,
        state: available.state,
        targets: available.targets,
    }))
}

/// POST /v1/orders/:id/transitions
pub async fn advance_state(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<OrderResponse>, AppError> {
    let order = state
        .service
        .advance_state(order_id, req.to, &req.actor, req.note, req.payment)
        .await?;
    Ok(Json(order.into()))
}

/// POST /v1/orders/:id/payment
pub async fn collect_payment(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<PaymentReceipt>, AppError> {
    Ok(Json(state.service.collect_payment(order_id, req).await?))
}

/// POST /v1/delivery/quote
/// Fee and prep time shown at checkout, before the order exists
pub async fn delivery_quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<DeliveryQuote>, AppError> {
    let pricing = state.pricing_snapshot().await;
    Ok(Json(quote(&pricing, req.distance_km)?))
}
