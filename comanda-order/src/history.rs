use chrono::{DateTime, Utc};
use comanda_core::{Actor, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state_machine::{self, OrderState};

/// Append-only audit record of one state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHistoryEntry {
    pub id: Uuid,
    pub order_id: Uuid,
    /// `None` only for the entry written when the order is created
    pub from_state: Option<OrderState>,
    pub to_state: OrderState,
    pub actor_id: String,
    pub actor_role: Role,
    pub note: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl OrderHistoryEntry {
    pub fn creation(order_id: Uuid, actor: &Actor, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            from_state: None,
            to_state: OrderState::Created,
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            note: None,
            timestamp: now,
        }
    }

    pub fn transition(
        order_id: Uuid,
        from: OrderState,
        to: OrderState,
        actor: &Actor,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            from_state: Some(from),
            to_state: to,
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            note: note.filter(|n| !n.trim().is_empty()),
            timestamp: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplayError {
    #[error("History is empty")]
    Empty,

    #[error("History does not start with the creation entry")]
    MissingCreation,

    #[error("Entry {index} belongs to order {found}, expected {expected}")]
    ForeignEntry { index: usize, expected: Uuid, found: Uuid },

    #[error("Entry {index} starts from {found:?} but the order was {expected}")]
    Broken {
        index: usize,
        expected: OrderState,
        found: Option<OrderState>,
    },

    #[error("Entry {index} records {from} -> {to}, which {role} may not perform")]
    IllegalStep {
        index: usize,
        from: OrderState,
        to: OrderState,
        role: Role,
    },
}

/// Rebuild an order's state from its history.
///
/// Entries must be in append order. Each entry has to continue from the
/// previous one and be a move the transition table grants the recorded role.
pub fn replay(entries: &[OrderHistoryEntry]) -> Result<OrderState, ReplayError> {
    let first = entries.first().ok_or(ReplayError::Empty)?;
    if first.from_state.is_some() || first.to_state != OrderState::Created {
        return Err(ReplayError::MissingCreation);
    }

    let order_id = first.order_id;
    let mut state = OrderState::Created;

    for (index, entry) in entries.iter().enumerate().skip(1) {
        if entry.order_id != order_id {
            return Err(ReplayError::ForeignEntry {
                index,
                expected: order_id,
                found: entry.order_id,
            });
        }
        if entry.from_state != Some(state) {
            return Err(ReplayError::Broken {
                index,
                expected: state,
                found: entry.from_state,
            });
        }
        if !state_machine::allowed_targets(state, entry.actor_role).contains(&entry.to_state) {
            return Err(ReplayError::IllegalStep {
                index,
                from: state,
                to: entry.to_state,
                role: entry.actor_role,
            });
        }
        state = entry.to_state;
    }

    Ok(state)
}
