//! Vehicle instance repository implementation

use crate::repositories::db_error;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use coach_core::{
    models::{SeatLayout, VehicleInstance},
    traits::{Repository, VehicleRepository},
    AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

const VEHICLE_COLUMNS: &str = r#"
    id, vehicle_number, operator_name, origin, destination, travel_date,
    departs_at, arrives_at, base_price, total_seats, layout, created_at
"#;

/// PostgreSQL implementation of VehicleRepository
pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    /// Create a new vehicle repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<VehicleInstance, Uuid> for PgVehicleRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<VehicleInstance>> {
        debug!("Finding vehicle instance by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, VehicleRow>(&format!(
            "SELECT {} FROM vehicle_instances WHERE id = $1",
            VEHICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find vehicle instance", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<VehicleInstance>> {
        let rows = sqlx::query_as::<sqlx::Postgres, VehicleRow>(&format!(
            "SELECT {} FROM vehicle_instances ORDER BY departs_at DESC LIMIT $1 OFFSET $2",
            VEHICLE_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list vehicle instances", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vehicle_instances")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("count vehicle instances", e))?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity))]
    async fn create(&self, entity: &VehicleInstance) -> AppResult<VehicleInstance> {
        debug!("Creating vehicle instance {}", entity.vehicle_number);

        let row = sqlx::query_as::<sqlx::Postgres, VehicleRow>(&format!(
            r#"
            INSERT INTO vehicle_instances (
                id, vehicle_number, operator_name, origin, destination, travel_date,
                departs_at, arrives_at, base_price, total_seats, layout, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            VEHICLE_COLUMNS
        ))
        .bind(entity.id)
        .bind(&entity.vehicle_number)
        .bind(&entity.operator_name)
        .bind(&entity.origin)
        .bind(&entity.destination)
        .bind(entity.travel_date)
        .bind(entity.departs_at)
        .bind(entity.arrives_at)
        .bind(entity.base_price)
        .bind(entity.total_seats)
        .bind(entity.layout.to_string())
        .bind(entity.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create vehicle instance", e))?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM vehicle_instances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete vehicle instance", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VehicleRepository for PgVehicleRepository {
    #[instrument(skip(self))]
    async fn list_departing_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<VehicleInstance>> {
        let rows = sqlx::query_as::<sqlx::Postgres, VehicleRow>(&format!(
            r#"
            SELECT {} FROM vehicle_instances
            WHERE departs_at >= $1 AND departs_at < $2
            ORDER BY departs_at
            "#,
            VEHICLE_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list departing vehicle instances", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    vehicle_number: String,
    operator_name: String,
    origin: String,
    destination: String,
    travel_date: NaiveDate,
    departs_at: DateTime<Utc>,
    arrives_at: DateTime<Utc>,
    base_price: Decimal,
    total_seats: i32,
    layout: String,
    created_at: DateTime<Utc>,
}

impl From<VehicleRow> for VehicleInstance {
    fn from(row: VehicleRow) -> Self {
        Self {
            id: row.id,
            vehicle_number: row.vehicle_number,
            operator_name: row.operator_name,
            origin: row.origin,
            destination: row.destination,
            travel_date: row.travel_date,
            departs_at: row.departs_at,
            arrives_at: row.arrives_at,
            base_price: row.base_price,
            total_seats: row.total_seats,
            layout: SeatLayout::from_str(&row.layout).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}
