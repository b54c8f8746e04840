//! Common traits for stores and external collaborators
//!
//! Defines the seat ledger abstraction, record repositories, and the payment,
//! notification and cache seams the booking engine depends on.

use crate::error::AppError;
use crate::models::{
    Booking, NotificationKind, Payment, Seat, SeatGuard, SeatId, SeatState, VehicleInstance,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Generic repository trait for record stores
#[async_trait]
pub trait Repository<T, ID>: Send + Sync {
    /// Find entity by ID
    async fn find_by_id(&self, id: ID) -> Result<Option<T>, AppError>;

    /// Find all entities with pagination, newest first
    async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<T>, AppError>;

    /// Count total entities
    async fn count(&self) -> Result<i64, AppError>;

    /// Create a new entity
    async fn create(&self, entity: &T) -> Result<T, AppError>;

    /// Delete entity by ID
    async fn delete(&self, id: ID) -> Result<bool, AppError>;
}

/// Result of a guarded seat write
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// Guard held; the seat now has the new state
    Applied(Seat),
    /// Guard failed; the seat is unchanged and carries its current state
    Rejected(Seat),
    /// No such seat
    NotFound,
}

/// Authoritative seat status store
///
/// Every read reflects the latest committed write for that seat. Implementations
/// must make `compare_and_set` atomic per seat; writes to distinct seats must not
/// block each other.
#[async_trait]
pub trait SeatLedger: Send + Sync {
    /// Current state of a seat
    async fn get_seat(&self, id: &SeatId) -> Result<Option<Seat>, AppError>;

    /// Unconditional write, for callers that already established the right to write
    async fn set_status(&self, id: &SeatId, state: SeatState) -> Result<Option<Seat>, AppError>;

    /// Write `next` only if the seat's current state satisfies `guard`
    async fn compare_and_set(
        &self,
        id: &SeatId,
        guard: &SeatGuard,
        next: SeatState,
    ) -> Result<CasOutcome, AppError>;

    /// Every seat of a vehicle instance, in seat order
    async fn seats_for_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Seat>, AppError>;

    /// Locked seats whose hold ran out at or before `now`
    async fn expired_locks(&self, now: DateTime<Utc>) -> Result<Vec<Seat>, AppError>;

    /// Insert the seats of a newly scheduled vehicle instance
    async fn create_seats(&self, seats: &[Seat]) -> Result<usize, AppError>;
}

/// Vehicle instance repository
#[async_trait]
pub trait VehicleRepository: Repository<VehicleInstance, Uuid> {
    /// Instances departing in `[from, to)`
    async fn list_departing_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<VehicleInstance>, AppError>;
}

/// Booking repository with the status transitions the engine relies on
#[async_trait]
pub trait BookingRepository: Repository<Booking, Uuid> {
    /// Find booking by its booking number
    async fn find_by_number(&self, booking_number: &str) -> Result<Option<Booking>, AppError>;

    /// Whether a booking number is already taken
    async fn number_exists(&self, booking_number: &str) -> Result<bool, AppError>;

    /// Bookings of one caller, newest first
    async fn list_by_user(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, AppError>;

    /// Count bookings of one caller
    async fn count_by_user(&self, user_id: &str) -> Result<i64, AppError>;

    /// Bookings on a vehicle instance
    async fn list_by_vehicle(&self, vehicle_id: Uuid) -> Result<Vec<Booking>, AppError>;

    /// pending -> confirmed; `None` when the booking is missing or not pending
    async fn confirm_if_pending(
        &self,
        id: Uuid,
        payment_ref: &str,
    ) -> Result<Option<Booking>, AppError>;

    /// confirmed -> cancelled; `None` when the booking is missing or not confirmed
    async fn cancel_if_confirmed(
        &self,
        id: Uuid,
        refund_amount: Decimal,
        cancelled_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Option<Booking>, AppError>;

    /// Record that the travel reminder went out; false if already recorded
    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, AppError>;

    /// confirmed -> completed once the journey is over; `None` when the booking
    /// is missing or not confirmed
    async fn complete_if_confirmed(&self, id: Uuid) -> Result<Option<Booking>, AppError>;
}

/// Payment attempt repository
#[async_trait]
pub trait PaymentRepository: Repository<Payment, Uuid> {
    /// Attempts tied to one booking, oldest first
    async fn list_by_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>, AppError>;
}

/// Outcome of a charge or refund call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success { transaction_ref: String },
    Failure { reason: String },
}

impl PaymentOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentOutcome::Success { .. })
    }
}

/// External payment rail
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Method label stored on payment records
    fn method(&self) -> &str;

    /// Charge `amount` against `reference`
    async fn charge(&self, amount: Decimal, reference: &str) -> PaymentOutcome;

    /// Refund `amount` against `reference`
    async fn refund(&self, amount: Decimal, reference: &str) -> PaymentOutcome;
}

/// Outbound notification delivery (email, SMS)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        kind: NotificationKind,
        recipient: &str,
        payload: serde_json::Value,
    ) -> Result<(), AppError>;
}

/// Cache service trait
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Check if key exists
    async fn exists(&self, key: &str) -> Result<bool, AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 1000),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination() {
        let p = Pagination::new(1, 10);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.limit(), 10);

        let p = Pagination::new(3, 20);
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn test_pagination_bounds() {
        assert_eq!(Pagination::new(0, 10).page, 1);
        assert_eq!(Pagination::new(1, 2000).per_page, 1000);
    }

    #[test]
    fn test_pagination_meta() {
        assert_eq!(PaginationMeta::new(95, 1, 10).total_pages, 10);
        assert_eq!(PaginationMeta::new(101, 1, 10).total_pages, 11);
        assert_eq!(PaginationMeta::new(0, 1, 10).total_pages, 0);
    }

    #[test]
    fn test_payment_outcome() {
        assert!(PaymentOutcome::Success {
            transaction_ref: "T".into()
        }
        .is_success());
        assert!(!PaymentOutcome::Failure { reason: "x".into() }.is_success());
    }
}
