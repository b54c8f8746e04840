//! In-memory record stores for vehicles, bookings and payments

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{
    models::{Booking, BookingStatus, Payment, VehicleInstance},
    traits::{BookingRepository, PaymentRepository, Repository, VehicleRepository},
    AppError, AppResult,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

/// Vehicle instances kept in a map
#[derive(Default)]
pub struct MemoryVehicleRepository {
    vehicles: RwLock<HashMap<Uuid, VehicleInstance>>,
}

impl MemoryVehicleRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository<VehicleInstance, Uuid> for MemoryVehicleRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<VehicleInstance>> {
        Ok(self.vehicles.read().get(&id).cloned())
    }

    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<VehicleInstance>> {
        let mut all: Vec<VehicleInstance> = self.vehicles.read().values().cloned().collect();
        all.sort_by(|a, b| b.departs_at.cmp(&a.departs_at));
        Ok(page(all, limit, offset))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.vehicles.read().len() as i64)
    }

    #[instrument(skip(self, entity), fields(vehicle_id = %entity.id))]
    async fn create(&self, entity: &VehicleInstance) -> AppResult<VehicleInstance> {
        let mut vehicles = self.vehicles.write();
        if vehicles.contains_key(&entity.id) {
            return Err(AppError::AlreadyExists(format!(
                "Vehicle instance {}",
                entity.id
            )));
        }
        vehicles.insert(entity.id, entity.clone());
        debug!("Stored vehicle instance {}", entity.vehicle_number);
        Ok(entity.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.vehicles.write().remove(&id).is_some())
    }
}

#[async_trait]
impl VehicleRepository for MemoryVehicleRepository {
    async fn list_departing_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<VehicleInstance>> {
        let mut departing: Vec<VehicleInstance> = self
            .vehicles
            .read()
            .values()
            .filter(|v| v.departs_at >= from && v.departs_at < to)
            .cloned()
            .collect();
        departing.sort_by_key(|v| v.departs_at);
        Ok(departing)
    }
}

/// Bookings kept in a map; status transitions run under the write lock
#[derive(Default)]
pub struct MemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl MemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut bookings: Vec<Booking>) -> Vec<Booking> {
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings
    }
}

#[async_trait]
impl Repository<Booking, Uuid> for MemoryBookingRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Booking>> {
        Ok(self.bookings.read().get(&id).cloned())
    }

    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Booking>> {
        let all = self.bookings.read().values().cloned().collect();
        Ok(page(Self::newest_first(all), limit, offset))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.bookings.read().len() as i64)
    }

    #[instrument(skip(self, entity), fields(booking_number = %entity.booking_number))]
    async fn create(&self, entity: &Booking) -> AppResult<Booking> {
        let mut bookings = self.bookings.write();
        if bookings.contains_key(&entity.id)
            || bookings
                .values()
                .any(|b| b.booking_number == entity.booking_number)
        {
            return Err(AppError::AlreadyExists(format!(
                "Booking {}",
                entity.booking_number
            )));
        }
        bookings.insert(entity.id, entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.bookings.write().remove(&id).is_some())
    }
}

#[async_trait]
impl BookingRepository for MemoryBookingRepository {
    async fn find_by_number(&self, booking_number: &str) -> AppResult<Option<Booking>> {
        Ok(self
            .bookings
            .read()
            .values()
            .find(|b| b.booking_number == booking_number)
            .cloned())
    }

    async fn number_exists(&self, booking_number: &str) -> AppResult<bool> {
        Ok(self
            .bookings
            .read()
            .values()
            .any(|b| b.booking_number == booking_number))
    }

    async fn list_by_user(&self, user_id: &str, limit: i64, offset: i64) -> AppResult<Vec<Booking>> {
        let mine = self
            .bookings
            .read()
            .values()
            .filter(|b| b.is_owned_by(user_id))
            .cloned()
            .collect();
        Ok(page(Self::newest_first(mine), limit, offset))
    }

    async fn count_by_user(&self, user_id: &str) -> AppResult<i64> {
        Ok(self
            .bookings
            .read()
            .values()
            .filter(|b| b.is_owned_by(user_id))
            .count() as i64)
    }

    async fn list_by_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vec<Booking>> {
        let mut on_vehicle: Vec<Booking> = self
            .bookings
            .read()
            .values()
            .filter(|b| b.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        on_vehicle.sort_by_key(|b| b.created_at);
        Ok(on_vehicle)
    }

    #[instrument(skip(self))]
    async fn confirm_if_pending(&self, id: Uuid, payment_ref: &str) -> AppResult<Option<Booking>> {
        let mut bookings = self.bookings.write();
        match bookings.get_mut(&id) {
            Some(booking) if booking.status == BookingStatus::Pending => {
                booking.status = BookingStatus::Confirmed;
                booking.payment_ref = Some(payment_ref.to_string());
                booking.updated_at = Utc::now();
                info!("Booking {} confirmed", id);
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn cancel_if_confirmed(
        &self,
        id: Uuid,
        refund_amount: Decimal,
        cancelled_at: DateTime<Utc>,
        reason: Option<String>,
    ) -> AppResult<Option<Booking>> {
        let mut bookings = self.bookings.write();
        match bookings.get_mut(&id) {
            Some(booking) if booking.status == BookingStatus::Confirmed => {
                booking.status = BookingStatus::Cancelled;
                booking.refund_amount = Some(refund_amount);
                booking.cancelled_at = Some(cancelled_at);
                booking.cancellation_reason = reason;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_reminder_sent(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<bool> {
        let mut bookings = self.bookings.write();
        match bookings.get_mut(&id) {
            Some(booking) if booking.reminder_sent_at.is_none() => {
                booking.reminder_sent_at = Some(at);
                booking.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_if_confirmed(&self, id: Uuid) -> AppResult<Option<Booking>> {
        let mut bookings = self.bookings.write();
        match bookings.get_mut(&id) {
            Some(booking) if booking.status == BookingStatus::Confirmed => {
                booking.status = BookingStatus::Completed;
                booking.updated_at = Utc::now();
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }
}

/// Payment attempts kept in a map
#[derive(Default)]
pub struct MemoryPaymentRepository {
    payments: RwLock<HashMap<Uuid, Payment>>,
}

impl MemoryPaymentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository<Payment, Uuid> for MemoryPaymentRepository {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.payments.read().get(&id).cloned())
    }

    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<Payment>> {
        let mut all: Vec<Payment> = self.payments.read().values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page(all, limit, offset))
    }

    async fn count(&self) -> AppResult<i64> {
        Ok(self.payments.read().len() as i64)
    }

    async fn create(&self, entity: &Payment) -> AppResult<Payment> {
        self.payments.write().insert(entity.id, entity.clone());
        Ok(entity.clone())
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.payments.write().remove(&id).is_some())
    }
}

#[async_trait]
impl PaymentRepository for MemoryPaymentRepository {
    async fn list_by_booking(&self, booking_id: Uuid) -> AppResult<Vec<Payment>> {
        let mut attempts: Vec<Payment> = self
            .payments
            .read()
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|p| p.created_at);
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn booking(number: &str, user: &str) -> Booking {
        Booking::new_pending(
            number.to_string(),
            user.to_string(),
            Uuid::new_v4(),
            vec!["1A".to_string()],
            vec![],
            "traveller@example.com".to_string(),
            dec!(400),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_status_transitions_are_guarded() {
        let repo = MemoryBookingRepository::new();
        let created = repo.create(&booking("CB1", "alice")).await.unwrap();

        assert!(repo
            .cancel_if_confirmed(created.id, dec!(360), Utc::now(), None)
            .await
            .unwrap()
            .is_none());

        let confirmed = repo
            .confirm_if_pending(created.id, "TXN1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert!(repo
            .confirm_if_pending(created.id, "TXN2")
            .await
            .unwrap()
            .is_none());

        let cancelled = repo
            .cancel_if_confirmed(created.id, dec!(360), Utc::now(), Some("plans changed".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.refund_amount, Some(dec!(360)));
        assert!(repo.complete_if_confirmed(created.id).await.unwrap().is_none());
        assert!(repo
            .cancel_if_confirmed(created.id, dec!(360), Utc::now(), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_booking_number_is_unique() {
        let repo = MemoryBookingRepository::new();
        repo.create(&booking("CB1", "alice")).await.unwrap();

        assert!(repo.number_exists("CB1").await.unwrap());
        assert!(matches!(
            repo.create(&booking("CB1", "bob")).await,
            Err(AppError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_list_by_user() {
        let repo = MemoryBookingRepository::new();
        repo.create(&booking("CB1", "alice")).await.unwrap();
        repo.create(&booking("CB2", "alice")).await.unwrap();
        repo.create(&booking("CB3", "bob")).await.unwrap();

        assert_eq!(repo.list_by_user("alice", 10, 0).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_user("alice", 1, 1).await.unwrap().len(), 1);
        assert_eq!(repo.count_by_user("bob").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reminder_marked_once() {
        let repo = MemoryBookingRepository::new();
        let created = repo.create(&booking("CB1", "alice")).await.unwrap();

        assert!(repo.mark_reminder_sent(created.id, Utc::now()).await.unwrap());
        assert!(!repo.mark_reminder_sent(created.id, Utc::now()).await.unwrap());
    }
}
