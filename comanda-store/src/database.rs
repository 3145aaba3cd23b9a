use comanda_catalog::PricingConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

#[derive(sqlx::FromRow)]
struct PricingRow {
    base_fee: i64,
    base_distance_km: f64,
    fee_per_extra_km: i64,
    max_delivery_distance_km: f64,
    estimated_prep_minutes: i32,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&self.pool)
            .await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// The restaurant profile's delivery pricing, or `defaults` if none is stored
    pub async fn fetch_pricing(&self, defaults: PricingConfig) -> Result<PricingConfig, sqlx::Error> {
        let row: Option<PricingRow> = sqlx::query_as(
            "SELECT base_fee, base_distance_km, fee_per_extra_km, max_delivery_distance_km, estimated_prep_minutes \
             FROM restaurant_pricing ORDER BY updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(row) => PricingConfig {
                base_fee: row.base_fee,
                base_distance_km: row.base_distance_km,
                fee_per_extra_km: row.fee_per_extra_km,
                max_delivery_distance_km: row.max_delivery_distance_km,
                estimated_prep_minutes: row.estimated_prep_minutes.max(0) as u32,
            },
            None => defaults,
        })
    }
}
