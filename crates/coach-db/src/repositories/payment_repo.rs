//! Payment attempt repository implementation

use crate::repositories::db_error;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{
    models::{Payment, PaymentKind, PaymentStatus},
    traits::{PaymentRepository, Repository},
    AppResult,
};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = r#"
    id, booking_id, kind, amount, method, transaction_ref, status,
    failure_reason, created_at
"#;

/// PostgreSQL implementation of PaymentRepository
pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository<Payment, Uuid> for PgPaymentRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("find payment", e))?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            "SELECT {} FROM payments ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            PAYMENT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list payments", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn count(&self) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("count payments", e))?;

        Ok(result.0)
    }

    #[instrument(skip(self, entity), fields(booking_id = %entity.booking_id, kind = %entity.kind))]
    async fn create(&self, entity: &Payment) -> AppResult<Payment> {
        debug!("Recording {} of {}", entity.kind, entity.amount);

        let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (
                id, booking_id, kind, amount, method, transaction_ref, status,
                failure_reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(entity.id)
        .bind(entity.booking_id)
        .bind(entity.kind.to_string())
        .bind(entity.amount)
        .bind(&entity.method)
        .bind(&entity.transaction_ref)
        .bind(entity.status.to_string())
        .bind(&entity.failure_reason)
        .bind(entity.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("record payment", e))?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("delete payment", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    #[instrument(skip(self))]
    async fn list_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Payment>> {
        let rows = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE booking_id = $1 ORDER BY created_at",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("list payments by booking", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    kind: String,
    amount: Decimal,
    method: String,
    transaction_ref: Option<String>,
    status: String,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(row: PaymentRow) -> Self {
        Self {
            id: row.id,
            booking_id: row.booking_id,
            kind: PaymentKind::from_str(&row.kind).unwrap_or_default(),
            amount: row.amount,
            method: row.method,
            transaction_ref: row.transaction_ref,
            status: PaymentStatus::from_str(&row.status).unwrap_or(PaymentStatus::Failed),
            failure_reason: row.failure_reason,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_conversion() {
        let row = PaymentRow {
            id: Uuid::new_v4(),
            booking_id: Uuid::new_v4(),
            kind: "refund".to_string(),
            amount: dec!(720),
            method: "mock_payment".to_string(),
            transaction_ref: Some("RFD1".to_string()),
            status: "succeeded".to_string(),
            failure_reason: None,
            created_at: Utc::now(),
        };

        let payment: Payment = row.into();
        assert_eq!(payment.kind, PaymentKind::Refund);
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.amount, dec!(720));
    }
}
