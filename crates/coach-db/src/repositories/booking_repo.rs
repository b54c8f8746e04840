//! Booking repository implementation
//!
//! Status transitions are single guarded updates (`WHERE status = ...`), so a
//! booking is confirmed at most once and cancelled (and refunded) at most once.

use crate::repositories::db_error;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use coach_core::{
    models::{Booking, BookingStatus, Passenger},
    traits::{BookingRepository, Repository},
    AppResult,
};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const BOOKING_COLUMNS: &str = r#"
    id, booking_number, user_id, vehicle_id, seat_numbers, passengers,
    contact_email, total_amount, status, payment_ref, travel_date,
    created_at, updated_at, refund_amount, cancelled_at,
    cancellation_reason, reminder_sent_at
"#;

/// PostgreSQL implementation of BookingRepository
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    /// Create a new booking repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parse booking status from string
    fn parse_status(s: &str) -> BookingStatus {
        BookingStatus::from_str(s).unwrap_or(BookingStatus::Pending)
    }
}

#[async_trait]
impl Repository<Booking, Uuid> for PgBookingRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        debug!("Finding booking by id: {}", id);

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find booking", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            BOOKING_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list bookings", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("count bookings", e))?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity), fields(booking_number = %entity.booking_number))]
    async fn create(&self, entity: &Booking) -> AppResult<Booking> {
        debug!("Creating booking for user {}", entity.user_id);

        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            r#"
            INSERT INTO bookings (
                id, booking_number, user_id, vehicle_id, seat_numbers, passengers,
                contact_email, total_amount, status, payment_ref, travel_date,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(entity.id)
        .bind(&entity.booking_number)
        .bind(&entity.user_id)
        .bind(entity.vehicle_id)
        .bind(&entity.seat_numbers)
        .bind(Json(&entity.passengers))
        .bind(&entity.contact_email)
        .bind(entity.total_amount)
        .bind(entity.status.to_string())
        .bind(&entity.payment_ref)
        .bind(entity.travel_date)
        .bind(entity.created_at)
        .bind(entity.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("create booking", e))?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        debug!("Deleting booking: {}", id);

        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete booking", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    #[instrument(skip(self))]
    async fn find_by_number(&self, booking_number: &str) -> AppResult<Option<Booking>> {
        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE booking_number = $1",
            BOOKING_COLUMNS
        ))
        .bind(booking_number)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find booking by number", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn number_exists(&self, booking_number: &str) -> AppResult<bool> {
        let result: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM bookings WHERE booking_number = $1)")
                .bind(booking_number)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("check booking number", e))?;

        Ok(result.0)
    }

    #[instrument(skip(self))]
    async fn list_by_user(&self, user_id: &str, limit: i64, offset: i64) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list bookings by user", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count_by_user(&self, user_id: &str) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("count bookings by user", e))?;

        Ok(result.0)
    }

    #[instrument(skip(self))]
    async fn list_by_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vec<Booking>> {
        let rows = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE vehicle_id = $1 ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list bookings by vehicle", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn confirm_if_pending(&self, id: Uuid, payment_ref: &str) -> AppResult<Option<Booking>> {
        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = 'confirmed', payment_ref = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(payment_ref)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("confirm booking", e))?;

        if row.is_some() {
            info!("Booking {} confirmed", id);
        }

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn cancel_if_confirmed(
        &self,
        id: Uuid,
        refund_amount: Decimal,
        cancelled_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> AppResult<Option<Booking>> {
        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = 'cancelled',
                refund_amount = $2,
                cancelled_at = $3,
                cancellation_reason = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'confirmed'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(refund_amount)
        .bind(cancelled_at)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("cancel booking", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET reminder_sent_at = $2, updated_at = NOW()
            WHERE id = $1 AND reminder_sent_at IS NULL
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("mark reminder sent", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn complete_if_confirmed(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let row = sqlx::query_as::<sqlx::Postgres, BookingRow>(&format!(
            r#"
            UPDATE bookings
            SET status = 'completed', updated_at = NOW()
            WHERE id = $1 AND status = 'confirmed'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("complete booking", e))?;

        Ok(row.map(Into::into))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_number: String,
    user_id: String,
    vehicle_id: Uuid,
    seat_numbers: Vec<String>,
    passengers: Json<Vec<Passenger>>,
    contact_email: String,
    total_amount: Decimal,
    status: String,
    payment_ref: Option<String>,
    travel_date: NaiveDate,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    refund_amount: Option<Decimal>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    reminder_sent_at: Option<DateTime<Utc>>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.id,
            booking_number: row.booking_number,
            user_id: row.user_id,
            vehicle_id: row.vehicle_id,
            seat_numbers: row.seat_numbers,
            passengers: row.passengers.0,
            contact_email: row.contact_email,
            total_amount: row.total_amount,
            status: PgBookingRepository::parse_status(&row.status),
            payment_ref: row.payment_ref,
            travel_date: row.travel_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
            refund_amount: row.refund_amount,
            cancelled_at: row.cancelled_at,
            cancellation_reason: row.cancellation_reason,
            reminder_sent_at: row.reminder_sent_at,
        }
    }
}
