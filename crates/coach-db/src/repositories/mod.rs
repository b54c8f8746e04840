//! PostgreSQL implementations of the store traits
//!
//! This module contains concrete implementations of the seat ledger and the
//! record repositories defined in coach-core, using sqlx for PostgreSQL access.

pub mod booking_repo;
pub mod payment_repo;
pub mod seat_ledger;
pub mod vehicle_repo;

pub use booking_repo::PgBookingRepository;
pub use payment_repo::PgPaymentRepository;
pub use seat_ledger::PgSeatLedger;
pub use vehicle_repo::PgVehicleRepository;

use coach_core::AppError;
use tracing::error;

/// Log a sqlx failure and classify it (pool exhaustion and I/O are transient)
pub(crate) fn db_error(action: &str, err: sqlx::Error) -> AppError {
    error!("Database error trying to {}: {}", action, err);
    match AppError::from(err) {
        AppError::Database(msg) => AppError::Database(format!("Failed to {}: {}", action, msg)),
        other => other,
    }
}
