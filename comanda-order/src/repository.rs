use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::history::OrderHistoryEntry;
use crate::models::Order;

/// Durable home of orders and their history.
///
/// Implementations must write an order change and its history entry as one
/// unit, and must refuse an update whose `expected_version` no longer
/// matches the stored order.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Store a new order with its creation entry
    async fn insert_order(&self, order: &Order, entry: &OrderHistoryEntry) -> Result<(), RepositoryError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// Replace the stored order if its version still equals `expected_version`
    async fn update_order(
        &self,
        order: &Order,
        expected_version: u64,
        entry: Option<&OrderHistoryEntry>,
    ) -> Result<(), RepositoryError>;

    /// History in append order
    async fn history(&self, order_id: Uuid) -> Result<Vec<OrderHistoryEntry>, RepositoryError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Order already exists: {0}")]
    Duplicate(Uuid),

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Version conflict on order {order_id}: expected {expected}, found {actual}")]
    VersionConflict { order_id: Uuid, expected: u64, actual: u64 },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Default)]
struct MemoryState {
    orders: HashMap<Uuid, Order>,
    history: HashMap<Uuid, Vec<OrderHistoryEntry>>,
}

/// Process-local repository, used by tests and when no database is configured
#[derive(Default)]
pub struct InMemoryOrderRepository {
    state: RwLock<MemoryState>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn insert_order(&self, order: &Order, entry: &OrderHistoryEntry) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.orders.contains_key(&order.id) {
            return Err(RepositoryError::Duplicate(order.id));
        }
        state.orders.insert(order.id, order.clone());
        state.history.insert(order.id, vec![entry.clone()]);
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn update_order(
        &self,
        order: &Order,
        expected_version: u64,
        entry: Option<&OrderHistoryEntry>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;

        let stored = state
            .orders
            .get_mut(&order.id)
            .ok_or(RepositoryError::NotFound(order.id))?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict {
                order_id: order.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        *stored = order.clone();

        if let Some(entry) = entry {
            state.history.entry(order.id).or_default().push(entry.clone());
        }
        Ok(())
    }

    async fn history(&self, order_id: Uuid) -> Result<Vec<OrderHistoryEntry>, RepositoryError> {
        let state = self.state.read().await;
        if !state.orders.contains_key(&order_id) {
            return Err(RepositoryError::NotFound(order_id));
        }
        Ok(state.history.get(&order_id).cloned().unwrap_or_default())
    }
}
