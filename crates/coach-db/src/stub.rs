//! Test stub backend
//!
//! Every operation fails with `AppError::NotImplemented` naming the operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{
    models::{Booking, Payment, Seat, SeatGuard, SeatId, SeatState, VehicleInstance},
    traits::{
        BookingRepository, CasOutcome, PaymentRepository, Repository, SeatLedger,
        VehicleRepository,
    },
    AppError, AppResult,
};
use rust_decimal::Decimal;
use uuid::Uuid;

fn unsupported<T>(operation: &str) -> AppResult<T> {
    Err(AppError::NotImplemented(operation.to_string()))
}

/// Store that supports nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct StubStore;

#[async_trait]
impl SeatLedger for StubStore {
    async fn get_seat(&self, _id: &SeatId) -> AppResult<Option<Seat>> {
        unsupported("get_seat")
    }

    async fn set_status(&self, _id: &SeatId, _state: SeatState) -> AppResult<Option<Seat>> {
        unsupported("set_status")
    }

    async fn compare_and_set(
        &self,
        _id: &SeatId,
        _guard: &SeatGuard,
        _next: SeatState,
    ) -> AppResult<CasOutcome> {
        unsupported("compare_and_set")
    }

    async fn seats_for_vehicle(&self, _vehicle_id: Uuid) -> AppResult<Vec<Seat>> {
        unsupported("seats_for_vehicle")
    }

    async fn expired_locks(&self, _now: DateTime<Utc>) -> AppResult<Vec<Seat>> {
        unsupported("expired_locks")
    }

    async fn create_seats(&self, _seats: &[Seat]) -> AppResult<usize> {
        unsupported("create_seats")
    }
}

macro_rules! stub_repository {
    ($entity:ty, $name:literal) => {
        #[async_trait]
        impl Repository<$entity, Uuid> for StubStore {
            async fn find_by_id(&self, _id: Uuid) -> AppResult<Option<$entity>> {
                unsupported(concat!($name, ".find_by_id"))
            }

            async fn find_all(&self, _limit: i64, _offset: i64) -> AppResult<Vec<$entity>> {
                unsupported(concat!($name, ".find_all"))
            }

            async fn count(&self) -> AppResult<i64> {
                unsupported(concat!($name, ".count"))
            }

            async fn create(&self, _entity: &$entity) -> AppResult<$entity> {
                unsupported(concat!($name, ".create"))
            }

            async fn delete(&self, _id: Uuid) -> AppResult<bool> {
                unsupported(concat!($name, ".delete"))
            }
        }
    };
}

stub_repository!(VehicleInstance, "vehicles");
stub_repository!(Booking, "bookings");
stub_repository!(Payment, "payments");

#[async_trait]
impl VehicleRepository for StubStore {
    async fn list_departing_between(
        &self,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> AppResult<Vec<VehicleInstance>> {
        unsupported("vehicles.list_departing_between")
    }
}

#[async_trait]
impl BookingRepository for StubStore {
    async fn find_by_number(&self, _booking_number: &str) -> AppResult<Option<Booking>> {
        unsupported("bookings.find_by_number")
    }

    async fn number_exists(&self, _booking_number: &str) -> AppResult<bool> {
        unsupported("bookings.number_exists")
    }

    async fn list_by_user(
        &self,
        _user_id: &str,
        _limit: i64,
        _offset: i64,
    ) -> AppResult<Vec<Booking>> {
        unsupported("bookings.list_by_user")
    }

    async fn count_by_user(&self, _user_id: &str) -> AppResult<i64> {
        unsupported("bookings.count_by_user")
    }

    async fn list_by_vehicle(&self, _vehicle_id: Uuid) -> AppResult<Vec<Booking>> {
        unsupported("bookings.list_by_vehicle")
    }

    async fn confirm_if_pending(
        &self,
        _id: Uuid,
        _payment_ref: &str,
    ) -> AppResult<Option<Booking>> {
        unsupported("bookings.confirm_if_pending")
    }

    async fn cancel_if_confirmed(
        &self,
        _id: Uuid,
        _refund_amount: Decimal,
        _cancelled_at: DateTime<Utc>,
        _reason: Option<String>,
    ) -> AppResult<Option<Booking>> {
        unsupported("bookings.cancel_if_confirmed")
    }

    async fn mark_reminder_sent(&self, _id: Uuid, _at: DateTime<Utc>) -> AppResult<bool> {
        unsupported("bookings.mark_reminder_sent")
    }

    async fn complete_if_confirmed(&self, _id: Uuid) -> AppResult<Option<Booking>> {
        unsupported("bookings.complete_if_confirmed")
    }
}

#[async_trait]
impl PaymentRepository for StubStore {
    async fn list_by_booking(&self, _booking_id: Uuid) -> AppResult<Vec<Payment>> {
        unsupported("payments.list_by_booking")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_fails_with_not_implemented() {
        let stub = StubStore;
        let err = SeatLedger::get_seat(&stub, &SeatId::new(Uuid::new_v4(), "1A"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::NotImplemented("get_seat".to_string()));

        let err = BookingRepository::number_exists(&stub, "CB1").await.unwrap_err();
        assert_eq!(err.status_code().as_u16(), 501);

        let err = Repository::<Payment, Uuid>::count(&stub).await.unwrap_err();
        assert_eq!(err, AppError::NotImplemented("payments.count".to_string()));
    }
}
