//! Service wiring
//!
//! Builds every service of one engine instance over a [`Stores`] bundle. Built
//! once at startup and shared behind an `Arc`.

use crate::analytics::AnalyticsService;
use crate::booking_workflow::{BookingReceipt, BookingRequest, BookingWorkflow};
use crate::broadcaster::SeatBroadcaster;
use crate::cancellation::{CancellationEngine, CancellationOutcome};
use crate::coordinator::{ReservationCoordinator, ReservationOutcome};
use crate::lock_manager::LockManager;
use crate::notifier::BestEffortNotifier;
use crate::reaper::Reaper;
use crate::reminders::TravelReminders;
use crate::retry::RetryPolicy;
use crate::scheduler::VehicleScheduler;
use coach_core::{
    config::BookingConfig,
    traits::{Notifier, PaymentGateway},
    AppResult,
};
use coach_db::Stores;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

pub struct BookingEngine {
    pub stores: Stores,
    pub locks: Arc<LockManager>,
    pub broadcaster: Arc<SeatBroadcaster>,
    pub coordinator: Arc<ReservationCoordinator>,
    pub workflow: Arc<BookingWorkflow>,
    pub cancellation: Arc<CancellationEngine>,
    pub scheduler: Arc<VehicleScheduler>,
    pub analytics: Arc<AnalyticsService>,
    notifier: BestEffortNotifier,
    reaper_interval: Duration,
    reminder_interval: Duration,
}

impl BookingEngine {
    pub fn new(
        stores: Stores,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: &BookingConfig,
    ) -> Self {
        let retry = RetryPolicy::from_config(config);
        let notifier = BestEffortNotifier::new(notifier);
        let broadcaster = Arc::new(SeatBroadcaster::new());
        let locks = Arc::new(LockManager::new(stores.seats.clone(), config.lock_ttl()));

        let coordinator = Arc::new(ReservationCoordinator::new(
            locks.clone(),
            broadcaster.clone(),
            retry,
        ));

        let workflow = Arc::new(BookingWorkflow::new(
            coordinator.clone(),
            locks.clone(),
            broadcaster.clone(),
            stores.vehicles.clone(),
            stores.bookings.clone(),
            stores.payments.clone(),
            gateway.clone(),
            notifier.clone(),
            config.booking_number_prefix.clone(),
            config.max_seats_per_booking,
            retry,
        ));

        let cancellation = Arc::new(CancellationEngine::new(
            locks.clone(),
            broadcaster.clone(),
            stores.vehicles.clone(),
            stores.bookings.clone(),
            stores.payments.clone(),
            gateway,
            notifier.clone(),
            config.cancellation_cutoff(),
            config.refund_percent,
            retry,
        ));

        let scheduler = Arc::new(VehicleScheduler::new(
            stores.seats.clone(),
            stores.vehicles.clone(),
            retry,
        ));

        let analytics = Arc::new(AnalyticsService::new(stores.bookings.clone()));

        Self {
            stores,
            locks,
            broadcaster,
            coordinator,
            workflow,
            cancellation,
            scheduler,
            analytics,
            notifier,
            reaper_interval: config.reaper_interval(),
            reminder_interval: config.reminder_interval(),
        }
    }

    /// ReserveSeats
    pub async fn reserve_seats(
        &self,
        vehicle_id: Uuid,
        seat_numbers: &[String],
        holder: &str,
    ) -> AppResult<ReservationOutcome> {
        self.coordinator.reserve(vehicle_id, seat_numbers, holder).await
    }

    pub async fn unlock_seats(
        &self,
        vehicle_id: Uuid,
        seat_numbers: &[String],
        holder: &str,
    ) -> AppResult<Vec<String>> {
        self.coordinator.unlock(vehicle_id, seat_numbers, holder).await
    }

    /// ConfirmBooking
    pub async fn confirm_booking(
        &self,
        caller: &str,
        request: BookingRequest,
    ) -> AppResult<BookingReceipt> {
        self.workflow.confirm_booking(caller, request).await
    }

    /// CancelBooking
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        caller: &str,
        reason: Option<String>,
    ) -> AppResult<CancellationOutcome> {
        self.cancellation.cancel(booking_id, caller, reason).await
    }

    /// Reaper over this engine's locks, with its shutdown sender
    pub fn reaper(&self) -> (Reaper, watch::Sender<bool>) {
        Reaper::new(
            self.locks.clone(),
            self.broadcaster.clone(),
            self.reaper_interval,
        )
    }

    /// Reminder loop over this engine's stores, with its shutdown sender
    pub fn reminders(&self) -> (TravelReminders, watch::Sender<bool>) {
        TravelReminders::new(
            self.stores.vehicles.clone(),
            self.stores.bookings.clone(),
            self.notifier.clone(),
            self.reminder_interval,
        )
    }
}
