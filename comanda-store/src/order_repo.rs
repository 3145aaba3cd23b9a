use async_trait::async_trait;
use chrono::{DateTime, Utc};
use comanda_core::Role;
use comanda_order::{
    Customer, LineItem, Order, OrderHistoryEntry, OrderRepository, OrderState, OrderType, PaymentRecord,
    RepositoryError,
};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

/// PostgreSQL-backed order store. Schema lives in `migrations/`.
pub struct StoreOrderRepository {
    pool: PgPool,
}

impl StoreOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal structs for type-safe querying
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_type: String,
    state: String,
    customer: Json<Customer>,
    line_items: Json<Vec<LineItem>>,
    product_subtotal: i64,
    delivery_fee: Option<i64>,
    distance_km: Option<f64>,
    payment: Option<Json<PaymentRecord>>,
    assigned_rider_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

#[derive(sqlx::FromRow)]
struct HistoryRow {
    id: Uuid,
    order_id: Uuid,
    from_state: Option<String>,
    to_state: String,
    actor_id: String,
    actor_role: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

fn backend(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(err.to_string())
}

fn corrupt(order_id: Uuid, detail: String) -> RepositoryError {
    RepositoryError::Backend(format!("corrupt row for order {}: {}", order_id, detail))
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            order_type: row.order_type.parse::<OrderType>().map_err(|e| corrupt(row.id, e))?,
            state: row.state.parse::<OrderState>().map_err(|e| corrupt(row.id, e))?,
            customer: row.customer.0,
            line_items: row.line_items.0,
            product_subtotal: row.product_subtotal,
            delivery_fee: row.delivery_fee,
            distance_km: row.distance_km,
            payment: row.payment.map(|p| p.0),
            assigned_rider_id: row.assigned_rider_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version as u64,
        })
    }
}

impl TryFrom<HistoryRow> for OrderHistoryEntry {
    type Error = RepositoryError;

    fn try_from(row: HistoryRow) -> Result<Self, Self::Error> {
        let from_state = row
            .from_state
            .map(|s| s.parse::<OrderState>())
            .transpose()
            .map_err(|e| corrupt(row.order_id, e))?;

        Ok(OrderHistoryEntry {
            id: row.id,
            order_id: row.order_id,
            from_state,
            to_state: row.to_state.parse::<OrderState>().map_err(|e| corrupt(row.order_id, e))?,
            actor_id: row.actor_id,
            actor_role: row
                .actor_role
                .parse::<Role>()
                .map_err(|e| corrupt(row.order_id, e.to_string()))?,
            note: row.note,
            timestamp: row.created_at,
        })
    }
}

async fn insert_history(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    entry: &OrderHistoryEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO order_history (id, order_id, from_state, to_state, actor_id, actor_role, note, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(entry.id)
    .bind(entry.order_id)
    .bind(entry.from_state.map(|s| s.as_str()))
    .bind(entry.to_state.as_str())
    .bind(&entry.actor_id)
    .bind(entry.actor_role.as_str())
    .bind(&entry.note)
    .bind(entry.timestamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl OrderRepository for StoreOrderRepository {
    async fn insert_order(&self, order: &Order, entry: &OrderHistoryEntry) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (id, order_type, state, customer, line_items, product_subtotal, delivery_fee,
                                distance_km, payment, payment_method, tip, assigned_rider_id, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(order.id)
        .bind(order.order_type.as_str())
        .bind(order.state.as_str())
        .bind(Json(&order.customer))
        .bind(Json(&order.line_items))
        .bind(order.product_subtotal)
        .bind(order.delivery_fee)
        .bind(order.distance_km)
        .bind(order.payment.as_ref().map(Json))
        .bind(order.payment_method().map(|m| m.as_str()))
        .bind(order.tip())
        .bind(&order.assigned_rider_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.version as i64)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            let duplicate = err
                .as_database_error()
                .is_some_and(|db| db.is_unique_violation());
            return Err(if duplicate {
                RepositoryError::Duplicate(order.id)
            } else {
                backend(err)
            });
        }

        insert_history(&mut tx, entry).await.map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            "SELECT id, order_type, state, customer, line_items, product_subtotal, delivery_fee, distance_km, \
             payment, assigned_rider_id, created_at, updated_at, version FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Order::try_from).transpose()
    }

    async fn update_order(
        &self,
        order: &Order,
        expected_version: u64,
        entry: Option<&OrderHistoryEntry>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Line items, totals and the delivery fee are frozen; only lifecycle fields move
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET state = $2, payment = $3, payment_method = $4, tip = $5, assigned_rider_id = $6,
                updated_at = $7, version = $8
            WHERE id = $1 AND version = $9
            "#,
        )
        .bind(order.id)
        .bind(order.state.as_str())
        .bind(order.payment.as_ref().map(Json))
        .bind(order.payment_method().map(|m| m.as_str()))
        .bind(order.tip())
        .bind(&order.assigned_rider_id)
        .bind(order.updated_at)
        .bind(order.version as i64)
        .bind(expected_version as i64)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                .bind(order.id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?;
            tx.rollback().await.map_err(backend)?;

            return Err(match actual {
                Some(actual) => RepositoryError::VersionConflict {
                    order_id: order.id,
                    expected: expected_version,
                    actual: actual as u64,
                },
                None => RepositoryError::NotFound(order.id),
            });
        }

        if let Some(entry) = entry {
            insert_history(&mut tx, entry).await.map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn history(&self, order_id: Uuid) -> Result<Vec<OrderHistoryEntry>, RepositoryError> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound(order_id));
        }

        let rows: Vec<HistoryRow> = sqlx::query_as(
            "SELECT id, order_id, from_state, to_state, actor_id, actor_role, note, created_at \
             FROM order_history WHERE order_id = $1 ORDER BY seq",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.into_iter().map(OrderHistoryEntry::try_from).collect()
    }
}
