//! Order state machine.
//!
//! ```text
//!   Created ──► Ready ──► Dispatched ──► Arrived ──► Delivered
//!      │          │  └──────────────────────────────▲   (establishment only)
//!      └──────────┴──► Cancelled
//! ```
//!
//! Who may fire which edge lives in [`TRANSITION_TABLE`]. Validation and
//! any display layer (buttons offered to a rider or cashier) read the same
//! table.

use chrono::{DateTime, Utc};
use comanda_core::{Actor, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::{Order, OrderType};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    /// Order taken
    Created,
    /// Kitchen finished preparing it
    Ready,
    /// A rider left with it
    Dispatched,
    /// The rider is at the customer's door
    Arrived,
    Delivered,
    Cancelled,
}

impl OrderState {
    pub const ALL: [OrderState; 6] = [
        OrderState::Created,
        OrderState::Ready,
        OrderState::Dispatched,
        OrderState::Arrived,
        OrderState::Delivered,
        OrderState::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Created => "CREATED",
            OrderState::Ready => "READY",
            OrderState::Dispatched => "DISPATCHED",
            OrderState::Arrived => "ARRIVED",
            OrderState::Delivered => "DELIVERED",
            OrderState::Cancelled => "CANCELLED",
        }
    }

    /// Label shown on the staff screens
    pub fn label(&self) -> &'static str {
        match self {
            OrderState::Created => "Pedido tomado",
            OrderState::Ready => "Lista",
            OrderState::Dispatched => "En camino",
            OrderState::Arrived => "Llegué a destino",
            OrderState::Delivered => "Entregada",
            OrderState::Cancelled => "Cancelada",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Delivered | OrderState::Cancelled)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown order state: {}", s))
    }
}

/// One row of the transition table: from `from`, an actor with `role` may
/// move the order to any of `to`.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub from: OrderState,
    pub role: Role,
    pub to: &'static [OrderState],
}

pub const TRANSITION_TABLE: &[TransitionRule] = &[
    TransitionRule {
        from: OrderState::Created,
        role: Role::Kitchen,
        to: &[OrderState::Ready],
    },
    TransitionRule {
        from: OrderState::Created,
        role: Role::Cashier,
        to: &[OrderState::Ready, OrderState::Cancelled],
    },
    TransitionRule {
        from: OrderState::Created,
        role: Role::Owner,
        to: &[OrderState::Cancelled],
    },
    TransitionRule {
        from: OrderState::Ready,
        role: Role::Rider,
        to: &[OrderState::Dispatched],
    },
    TransitionRule {
        from: OrderState::Ready,
        role: Role::Cashier,
        to: &[OrderState::Delivered, OrderState::Cancelled],
    },
    TransitionRule {
        from: OrderState::Ready,
        role: Role::Owner,
        to: &[OrderState::Cancelled],
    },
    TransitionRule {
        from: OrderState::Dispatched,
        role: Role::Rider,
        to: &[OrderState::Arrived],
    },
    TransitionRule {
        from: OrderState::Arrived,
        role: Role::Rider,
        to: &[OrderState::Delivered],
    },
    TransitionRule {
        from: OrderState::Arrived,
        role: Role::Cashier,
        to: &[OrderState::Delivered],
    },
];

/// Targets the table grants `role` from `from`, ignoring order type and
/// rider assignment
pub fn allowed_targets(from: OrderState, role: Role) -> &'static [OrderState] {
    TRANSITION_TABLE
        .iter()
        .find(|rule| rule.from == from && rule.role == role)
        .map(|rule| rule.to)
        .unwrap_or(&[])
}

/// Whether any role at all may move `from` to `to`
pub fn is_listed(from: OrderState, to: OrderState) -> bool {
    TRANSITION_TABLE
        .iter()
        .any(|rule| rule.from == from && rule.to.contains(&to))
}

/// Why a transition request was turned down
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionRejection {
    NotInTable,
    RoleNotPermitted { role: Role },
    WrongOrderType { order_type: OrderType },
    NotAssignedRider { assigned: Option<String>, actor: String },
    PaymentMissing,
}

impl fmt::Display for TransitionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionRejection::NotInTable => write!(f, "no such transition"),
            TransitionRejection::RoleNotPermitted { role } => {
                write!(f, "role {} may not perform it", role)
            }
            TransitionRejection::WrongOrderType { order_type } => {
                write!(f, "not available for {} orders", order_type)
            }
            TransitionRejection::NotAssignedRider { assigned, actor } => match assigned {
                Some(rider) => write!(f, "rider {} is not the assigned rider {}", actor, rider),
                None => write!(f, "rider {} is not assigned to this order", actor),
            },
            TransitionRejection::PaymentMissing => {
                write!(f, "order is unpaid and no payment was supplied")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition from {from} to {to}: {reason}")]
pub struct TransitionError {
    pub from: OrderState,
    pub to: OrderState,
    pub reason: TransitionRejection,
}

/// Work the caller must do alongside the state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,
    /// Record the acting rider on the order
    AssignRider,
    /// Collect payment unless the order is already paid
    SettlePayment,
}

/// A validated, not yet applied, transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderState,
    pub to: OrderState,
    pub effect: SideEffect,
}

pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Check `actor` may move `order` to `to`. Pure; nothing is changed.
    pub fn validate(order: &Order, to: OrderState, actor: &Actor) -> Result<Transition, TransitionError> {
        let from = order.state;
        let reject = |reason| TransitionError { from, to, reason };

        if !is_listed(from, to) {
            return Err(reject(TransitionRejection::NotInTable));
        }

        if !allowed_targets(from, actor.role).contains(&to) {
            return Err(reject(TransitionRejection::RoleNotPermitted { role: actor.role }));
        }

        let type_ok = match (from, to) {
            (_, OrderState::Dispatched) => order.order_type == OrderType::Delivery,
            (OrderState::Ready, OrderState::Delivered) => order.order_type == OrderType::Establishment,
            _ => true,
        };
        if !type_ok {
            return Err(reject(TransitionRejection::WrongOrderType {
                order_type: order.order_type,
            }));
        }

        if actor.role == Role::Rider && matches!(from, OrderState::Dispatched | OrderState::Arrived) {
            if order.assigned_rider_id.as_deref() != Some(actor.id.as_str()) {
                return Err(reject(TransitionRejection::NotAssignedRider {
                    assigned: order.assigned_rider_id.clone(),
                    actor: actor.id.clone(),
                }));
            }
        }

        let effect = match to {
            OrderState::Dispatched => SideEffect::AssignRider,
            OrderState::Delivered => SideEffect::SettlePayment,
            _ => SideEffect::None,
        };

        Ok(Transition { from, to, effect })
    }

    /// Apply a transition produced by [`OrderStateMachine::validate`] on the
    /// same order. Payment settlement is left to the caller.
    pub fn apply(order: &mut Order, transition: &Transition, actor: &Actor, now: DateTime<Utc>) {
        debug_assert_eq!(order.state, transition.from);

        if transition.effect == SideEffect::AssignRider {
            order.assigned_rider_id = Some(actor.id.clone());
        }
        order.state = transition.to;
        order.updated_at = now;
    }

    /// Every target the actor could pick right now, for rendering actions
    pub fn available_targets(order: &Order, actor: &Actor) -> Vec<OrderState> {
        allowed_targets(order.state, actor.role)
            .iter()
            .copied()
            .filter(|to| Self::validate(order, *to, actor).is_ok())
            .collect()
    }
}
