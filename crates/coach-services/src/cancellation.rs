//! Cancellation and refund engine
//!
//! A confirmed booking may be cancelled by its owner until the cutoff before
//! departure. The status change is claimed first; the refund, seat release and
//! notification follow. A failed refund does not undo the cancellation, it is
//! recorded and logged for reconciliation.

use crate::broadcaster::SeatBroadcaster;
use crate::lock_manager::LockManager;
use crate::notifier::BestEffortNotifier;
use crate::retry::{with_store_retry, RetryPolicy};
use chrono::{Duration, Utc};
use coach_core::{
    models::{Booking, BookingStatus, NotificationKind, Payment, PaymentKind, SeatEvent, SeatId},
    traits::{BookingRepository, PaymentGateway, PaymentOutcome, PaymentRepository, VehicleRepository},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Result of a cancellation
#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub booking: Booking,
    pub refund_amount: Decimal,
    /// False when the refund call failed and awaits reconciliation
    pub refund_settled: bool,
}

/// Refund owed for `total` at `percent`, rounded to cents
pub fn refund_amount(total: Decimal, percent: u32) -> Decimal {
    (total * Decimal::from(percent) / Decimal::from(100)).round_dp(2)
}

pub struct CancellationEngine {
    locks: Arc<LockManager>,
    broadcaster: Arc<SeatBroadcaster>,
    vehicles: Arc<dyn VehicleRepository>,
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: BestEffortNotifier,
    cutoff: Duration,
    refund_percent: u32,
    retry: RetryPolicy,
}

impl CancellationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        locks: Arc<LockManager>,
        broadcaster: Arc<SeatBroadcaster>,
        vehicles: Arc<dyn VehicleRepository>,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: BestEffortNotifier,
        cutoff: Duration,
        refund_percent: u32,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            locks,
            broadcaster,
            vehicles,
            bookings,
            payments,
            gateway,
            notifier,
            cutoff,
            refund_percent,
            retry,
        }
    }

    /// Cancel `booking_id` on behalf of `caller`
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        booking_id: Uuid,
        caller: &str,
        reason: Option<String>,
    ) -> AppResult<CancellationOutcome> {
        let booking = with_store_retry(self.retry, "load booking", || {
            self.bookings.find_by_id(booking_id)
        })
        .await?
        .ok_or_else(|| AppError::BookingNotFound(booking_id.to_string()))?;

        if !booking.is_owned_by(caller) {
            warn!("{} tried to cancel booking {} of {}", caller, booking.booking_number, booking.user_id);
            return Err(AppError::Forbidden);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(AppError::InvalidBookingState(format!(
                "booking {} is {}, only confirmed bookings can be cancelled",
                booking.booking_number, booking.status
            )));
        }

        let vehicle = with_store_retry(self.retry, "load vehicle", || {
            self.vehicles.find_by_id(booking.vehicle_id)
        })
        .await?
        .ok_or_else(|| AppError::VehicleNotFound(booking.vehicle_id.to_string()))?;

        let now = Utc::now();
        let remaining = vehicle.departs_at - now;
        if remaining < self.cutoff {
            return Err(AppError::CancellationWindowExpired {
                hours_remaining: remaining.num_hours(),
                cutoff_hours: self.cutoff.num_hours(),
            });
        }

        let refund = refund_amount(booking.total_amount, self.refund_percent);

        // Claim the transition before paying anything out
        let cancelled = with_store_retry(self.retry, "cancel booking", || {
            self.bookings
                .cancel_if_confirmed(booking.id, refund, now, reason.clone())
        })
        .await?
        .ok_or_else(|| {
            AppError::InvalidBookingState(format!(
                "booking {} is no longer confirmed",
                booking.booking_number
            ))
        })?;

        let refund_settled = self.refund(&cancelled, refund).await;

        for number in &cancelled.seat_numbers {
            let id = SeatId::new(cancelled.vehicle_id, number.clone());
            match with_store_retry(self.retry, "release booked seat", || {
                self.locks.release_booked(&id)
            })
            .await
            {
                Ok(outcome) if outcome.is_granted() => {
                    self.broadcaster.publish(
                        cancelled.vehicle_id,
                        &SeatEvent::unlocked(cancelled.vehicle_id, number.clone()),
                    );
                }
                Ok(outcome) => warn!(
                    "Seat {} of cancelled booking {} was {}",
                    id,
                    cancelled.booking_number,
                    outcome.seat().status()
                ),
                Err(e) => error!(
                    "Seat {} of cancelled booking {} not released: {}",
                    id, cancelled.booking_number, e
                ),
            }
        }

        self.notifier
            .send(
                NotificationKind::BookingCancelled,
                &cancelled.contact_email,
                json!({
                    "booking_number": cancelled.booking_number,
                    "route": vehicle.route_label(),
                    "departs_at": vehicle.departs_at,
                    "seats": cancelled.seat_numbers,
                    "total_amount": cancelled.total_amount,
                    "refund_amount": refund,
                    "refund_settled": refund_settled,
                }),
            )
            .await;

        info!(
            "Booking {} cancelled by {}, refund {}",
            cancelled.booking_number, caller, refund
        );

        Ok(CancellationOutcome {
            booking: cancelled,
            refund_amount: refund,
            refund_settled,
        })
    }

    /// Call the gateway and record the attempt either way
    async fn refund(&self, booking: &Booking, amount: Decimal) -> bool {
        let attempt = Payment::new(booking.id, PaymentKind::Refund, amount, self.gateway.method());

        let (record, settled) = match self.gateway.refund(amount, &booking.booking_number).await {
            PaymentOutcome::Success { transaction_ref } => (attempt.succeeded(transaction_ref), true),
            PaymentOutcome::Failure { reason } => {
                error!(
                    "Refund of {} for cancelled booking {} failed, needs reconciliation: {}",
                    amount, booking.booking_number, reason
                );
                (attempt.failed(reason), false)
            }
        };

        let stored = with_store_retry(self.retry, "record refund", || self.payments.create(&record)).await;
        if let Err(e) = stored {
            error!(
                "Refund attempt for {} not recorded: {}",
                booking.booking_number, e
            );
        }

        settled
    }
}
