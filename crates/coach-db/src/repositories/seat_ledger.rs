//! Seat ledger repository implementation
//!
//! PostgreSQL-backed seat ledger. Every guarded write is a single
//! `UPDATE ... WHERE <guard> RETURNING` statement, so the row lock taken by the
//! update is the only serialization point and distinct seats never contend.

use crate::repositories::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{
    models::{Seat, SeatClass, SeatGuard, SeatId, SeatState, SeatStatus},
    traits::{CasOutcome, SeatLedger},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const SEAT_COLUMNS: &str = r#"
    vehicle_id, seat_number, status, locked_by, locked_until,
    seat_class, price, seat_row, seat_column
"#;

type GuardParams<'a> = (
    &'static str,
    Option<&'a str>,
    Option<DateTime<Utc>>,
    Option<DateTime<Utc>>,
);

/// PostgreSQL implementation of SeatLedger
pub struct PgSeatLedger {
    pool: PgPool,
}

impl PgSeatLedger {
    /// Create a new seat ledger
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Guard encoded as (kind, holder, instant, lease expiry) parameters of the CAS statement
    fn guard_params(guard: &SeatGuard) -> GuardParams<'_> {
        match guard {
            SeatGuard::Available => ("available", None, None, None),
            SeatGuard::HeldBy(holder) => ("held_by", Some(holder.as_str()), None, None),
            SeatGuard::Lease { holder, expires_at } => {
                ("lease", Some(holder.as_str()), None, Some(*expires_at))
            }
            SeatGuard::LiveLease {
                holder,
                expires_at,
                now,
            } => ("live_lease", Some(holder.as_str()), Some(*now), Some(*expires_at)),
            SeatGuard::ExpiredAt(now) => ("expired", None, Some(*now), None),
            SeatGuard::Booked => ("booked", None, None, None),
        }
    }

    /// Stored columns of a state: (status, locked_by, locked_until)
    fn state_params(state: &SeatState) -> (String, Option<String>, Option<DateTime<Utc>>) {
        (
            state.status().to_string(),
            state.holder().map(str::to_string),
            state.expires_at(),
        )
    }
}

#[async_trait]
impl SeatLedger for PgSeatLedger {
    #[instrument(skip(self))]
    async fn get_seat(&self, id: &SeatId) -> AppResult<Option<Seat>> {
        debug!("Finding seat {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE vehicle_id = $1 AND seat_number = $2",
            SEAT_COLUMNS
        ))
        .bind(id.vehicle_id)
        .bind(&id.seat_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find seat", e))?;

        row.map(Seat::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: &SeatId, state: SeatState) -> AppResult<Option<Seat>> {
        debug!("Setting seat {} to {}", id, state.status());
        let (status, locked_by, locked_until) = Self::state_params(&state);

        let row = sqlx::query_as::<sqlx::Postgres, SeatRow>(&format!(
            r#"
            UPDATE seats
            SET status = $3, locked_by = $4, locked_until = $5, updated_at = NOW()
            WHERE vehicle_id = $1 AND seat_number = $2
            RETURNING {}
            "#,
            SEAT_COLUMNS
        ))
        .bind(id.vehicle_id)
        .bind(&id.seat_number)
        .bind(status)
        .bind(locked_by)
        .bind(locked_until)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("set seat status", e))?;

        row.map(Seat::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn compare_and_set(
        &self,
        id: &SeatId,
        guard: &SeatGuard,
        next: SeatState,
    ) -> AppResult<CasOutcome> {
        let (guard_kind, guard_holder, guard_instant, guard_lease) = Self::guard_params(guard);
        let (status, locked_by, locked_until) = Self::state_params(&next);

        let applied = sqlx::query_as::<sqlx::Postgres, SeatRow>(&format!(
            r#"
            UPDATE seats
            SET status = $3, locked_by = $4, locked_until = $5, updated_at = NOW()
            WHERE vehicle_id = $1
                AND seat_number = $2
                AND (
                    ($6 = 'available' AND status = 'available')
                    OR ($6 = 'held_by' AND status = 'locked' AND locked_by = $7)
                    OR ($6 = 'lease' AND status = 'locked'
                        AND locked_by = $7 AND locked_until = $9)
                    OR ($6 = 'live_lease' AND status = 'locked'
                        AND locked_by = $7 AND locked_until = $9 AND locked_until > $8)
                    OR ($6 = 'expired' AND status = 'locked' AND locked_until <= $8)
                    OR ($6 = 'booked' AND status = 'booked')
                )
            RETURNING {}
            "#,
            SEAT_COLUMNS
        ))
        .bind(id.vehicle_id)
        .bind(&id.seat_number)
        .bind(status)
        .bind(locked_by)
        .bind(locked_until)
        .bind(guard_kind)
        .bind(guard_holder)
        .bind(guard_instant)
        .bind(guard_lease)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("compare-and-set seat", e))?;

        if let Some(row) = applied {
            return Ok(CasOutcome::Applied(row.try_into()?));
        }

        match self.get_seat(id).await? {
            Some(current) => {
                debug!("CAS on seat {} rejected, current status {}", id, current.status());
                Ok(CasOutcome::Rejected(current))
            }
            None => Ok(CasOutcome::NotFound),
        }
    }

    #[instrument(skip(self))]
    async fn seats_for_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vec<Seat>> {
        debug!("Loading seat map for vehicle {}", vehicle_id);

        let rows = sqlx::query_as::<sqlx::Postgres, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE vehicle_id = $1 ORDER BY seat_row, seat_column",
            SEAT_COLUMNS
        ))
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("load seat map", e))?;

        rows.into_iter().map(Seat::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn expired_locks(&self, now: DateTime<Utc>) -> AppResult<Vec<Seat>> {
        let rows = sqlx::query_as::<sqlx::Postgres, SeatRow>(&format!(
            "SELECT {} FROM seats WHERE status = 'locked' AND locked_until <= $1",
            SEAT_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("scan expired locks", e))?;

        rows.into_iter().map(Seat::try_from).collect()
    }

    #[instrument(skip(self, seats), fields(count = seats.len()))]
    async fn create_seats(&self, seats: &[Seat]) -> AppResult<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("start seat creation", e))?;

        for seat in seats {
            let (status, locked_by, locked_until) = Self::state_params(&seat.state);
            sqlx::query(
                r#"
                INSERT INTO seats (
                    vehicle_id, seat_number, status, locked_by, locked_until,
                    seat_class, price, seat_row, seat_column
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(seat.vehicle_id)
            .bind(&seat.seat_number)
            .bind(status)
            .bind(locked_by)
            .bind(locked_until)
            .bind(seat.seat_class.to_string())
            .bind(seat.price)
            .bind(seat.row)
            .bind(seat.column)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("insert seat", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit seat creation", e))?;

        Ok(seats.len())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct SeatRow {
    vehicle_id: Uuid,
    seat_number: String,
    status: String,
    locked_by: Option<String>,
    locked_until: Option<DateTime<Utc>>,
    seat_class: String,
    price: Option<Decimal>,
    seat_row: i32,
    seat_column: i32,
}

impl TryFrom<SeatRow> for Seat {
    type Error = AppError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        let status = SeatStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Database(format!("Unknown seat status '{}'", row.status))
        })?;

        let state = SeatState::from_parts(status, row.locked_by, row.locked_until).ok_or_else(
            || {
                warn!(
                    "Seat {}/{} has inconsistent lock columns",
                    row.vehicle_id, row.seat_number
                );
                AppError::Database(format!(
                    "Seat {} has inconsistent lock columns",
                    row.seat_number
                ))
            },
        )?;

        Ok(Seat {
            vehicle_id: row.vehicle_id,
            seat_number: row.seat_number,
            state,
            seat_class: SeatClass::from_str(&row.seat_class).unwrap_or_default(),
            price: row.price,
            row: row.seat_row,
            column: row.seat_column,
        })
    }
}
