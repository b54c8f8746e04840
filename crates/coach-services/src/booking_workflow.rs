//! Booking workflow
//!
//! Runs one booking attempt end to end:
//!
//! ```text
//! Validating ──> Reserved ──> Charging ──> Confirmed
//!     │              │            │
//!     └─> Rejected   └─> Rejected └─> ReleasedOnFailure
//! ```
//!
//! Seats stay locked (not booked) while the charge is in flight, so a hung
//! payment is bounded by the lock TTL. Confirmation requires the exact leases
//! the reservation returned to be still in place and unexpired. If the reaper
//! got there first the charge is refunded and the attempt fails, even when the
//! caller has locked the seat again in the meantime.

use crate::broadcaster::SeatBroadcaster;
use crate::coordinator::{seat_set, ReservationCoordinator, ReservationOutcome};
use crate::lock_manager::{Lease, LockManager, LockOutcome};
use crate::notifier::BestEffortNotifier;
use crate::retry::{with_store_retry, RetryPolicy};
use chrono::Utc;
use coach_core::{
    models::{
        Booking, NotificationKind, Passenger, Payment, PaymentKind, SeatEvent, SeatId,
        VehicleInstance,
    },
    traits::{
        BookingRepository, PaymentGateway, PaymentOutcome, PaymentRepository, VehicleRepository,
    },
    AppError, AppResult,
};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Attempts at finding an unused booking number
const BOOKING_NUMBER_ATTEMPTS: usize = 5;

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// What a caller asks to book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub vehicle_id: Uuid,
    pub seat_numbers: Vec<String>,
    pub passengers: Vec<Passenger>,
    pub contact_email: String,
}

/// A confirmed booking and the charge that paid for it
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub payment: Payment,
}

/// `{prefix}{yyyymmddHHMMSS}{6 random base-36 chars}`
pub fn generate_booking_number(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}{}{}", prefix, Utc::now().format("%Y%m%d%H%M%S"), suffix)
}

/// Validated attempt
struct Checked {
    vehicle: VehicleInstance,
    seats: Vec<SeatId>,
    total: Decimal,
}

pub struct BookingWorkflow {
    coordinator: Arc<ReservationCoordinator>,
    locks: Arc<LockManager>,
    broadcaster: Arc<SeatBroadcaster>,
    vehicles: Arc<dyn VehicleRepository>,
    bookings: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: BestEffortNotifier,
    booking_number_prefix: String,
    max_seats: usize,
    retry: RetryPolicy,
}

impl BookingWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        coordinator: Arc<ReservationCoordinator>,
        locks: Arc<LockManager>,
        broadcaster: Arc<SeatBroadcaster>,
        vehicles: Arc<dyn VehicleRepository>,
        bookings: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: BestEffortNotifier,
        booking_number_prefix: String,
        max_seats: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            coordinator,
            locks,
            broadcaster,
            vehicles,
            bookings,
            payments,
            gateway,
            notifier,
            booking_number_prefix,
            max_seats,
            retry,
        }
    }

    /// Reserve, charge and confirm `request` for `caller`
    #[instrument(skip(self, request), fields(vehicle_id = %request.vehicle_id))]
    pub async fn confirm_booking(
        &self,
        caller: &str,
        request: BookingRequest,
    ) -> AppResult<BookingReceipt> {
        let Checked {
            vehicle,
            seats,
            total,
        } = self.validate(&request).await?;
        let numbers: Vec<String> = seats.iter().map(|s| s.seat_number.clone()).collect();

        let reserved = self.coordinator.reserve(vehicle.id, &numbers, caller).await?;
        let leases: Vec<Lease> = match reserved {
            ReservationOutcome::Reserved(held) => held.iter().filter_map(Lease::of).collect(),
            ReservationOutcome::PartiallyUnavailable(unavailable) => {
                return Err(AppError::SeatsUnavailable(unavailable));
            }
        };

        let booking = match self
            .create_pending(caller, &vehicle, request, numbers, total)
            .await
        {
            Ok(booking) => booking,
            Err(e) => {
                error!("Could not record pending booking: {}", e);
                self.release_all(&leases, &[]).await;
                return Err(e);
            }
        };

        info!(
            "Charging {} for booking {} ({} seats)",
            total,
            booking.booking_number,
            seats.len()
        );

        match self.gateway.charge(total, &booking.booking_number).await {
            PaymentOutcome::Failure { reason } => {
                warn!(
                    "Payment for {} declined: {}; releasing seats",
                    booking.booking_number, reason
                );
                self.release_all(&leases, &[]).await;
                self.discard(&booking).await;
                Err(AppError::PaymentDeclined(reason))
            }
            PaymentOutcome::Success { transaction_ref } => {
                self.commit(caller, &vehicle, booking, &leases, transaction_ref)
                    .await
            }
        }
    }

    async fn validate(&self, request: &BookingRequest) -> AppResult<Checked> {
        let seats = seat_set(request.vehicle_id, &request.seat_numbers);
        if seats.is_empty() {
            return Err(AppError::EmptySeatSelection);
        }
        if seats.len() > self.max_seats {
            return Err(AppError::Validation(format!(
                "at most {} seats per booking",
                self.max_seats
            )));
        }
        if request.passengers.is_empty() {
            return Err(AppError::Validation(
                "at least one passenger is required".to_string(),
            ));
        }
        if !request.contact_email.contains('@') {
            return Err(AppError::Validation(
                "a contact email is required".to_string(),
            ));
        }

        let vehicle = with_store_retry(self.retry, "load vehicle", || {
            self.vehicles.find_by_id(request.vehicle_id)
        })
        .await?
        .ok_or_else(|| AppError::VehicleNotFound(request.vehicle_id.to_string()))?;

        let mut total = Decimal::ZERO;
        for id in &seats {
            let seat = with_store_retry(self.retry, "load seat", || self.locks.ledger().get_seat(id))
                .await?
                .ok_or_else(|| AppError::SeatNotFound(id.seat_number.clone()))?;
            total += seat.fare(vehicle.base_price);
        }

        Ok(Checked {
            vehicle,
            seats,
            total,
        })
    }

    async fn create_pending(
        &self,
        caller: &str,
        vehicle: &VehicleInstance,
        request: BookingRequest,
        seat_numbers: Vec<String>,
        total: Decimal,
    ) -> AppResult<Booking> {
        let booking_number = self.unused_booking_number().await?;
        let booking = Booking::new_pending(
            booking_number,
            caller.to_string(),
            vehicle.id,
            seat_numbers,
            request.passengers,
            request.contact_email.trim().to_string(),
            total,
            vehicle.travel_date,
        );

        with_store_retry(self.retry, "create booking", || self.bookings.create(&booking)).await
    }

    async fn unused_booking_number(&self) -> AppResult<String> {
        for _ in 0..BOOKING_NUMBER_ATTEMPTS {
            let candidate = generate_booking_number(&self.booking_number_prefix);
            let taken = with_store_retry(self.retry, "check booking number", || {
                self.bookings.number_exists(&candidate)
            })
            .await?;
            if !taken {
                return Ok(candidate);
            }
            warn!("Booking number {} already taken, regenerating", candidate);
        }

        Err(AppError::Internal(
            "could not generate a unique booking number".to_string(),
        ))
    }

    async fn commit(
        &self,
        caller: &str,
        vehicle: &VehicleInstance,
        booking: Booking,
        leases: &[Lease],
        transaction_ref: String,
    ) -> AppResult<BookingReceipt> {
        let mut booked: Vec<SeatId> = Vec::with_capacity(leases.len());

        for lease in leases {
            let result = with_store_retry(self.retry, "confirm seat", || {
                self.locks.confirm(lease)
            })
            .await;

            let failure = match result {
                Ok(LockOutcome::Granted(_)) => {
                    booked.push(lease.seat.clone());
                    continue;
                }
                Ok(LockOutcome::Denied(seat)) => {
                    warn!(
                        "Hold on {} lost during payment for {} (now {})",
                        lease.seat,
                        booking.booking_number,
                        seat.status()
                    );
                    AppError::SeatNotHeld(lease.seat.seat_number.clone())
                }
                Err(e) => e,
            };

            self.compensate(&booking, leases, &booked, &transaction_ref)
                .await;
            return Err(failure);
        }

        let confirmed = with_store_retry(self.retry, "confirm booking", || {
            self.bookings.confirm_if_pending(booking.id, &transaction_ref)
        })
        .await;

        let confirmed = match confirmed {
            Ok(Some(confirmed)) => confirmed,
            Ok(None) => {
                self.compensate(&booking, leases, &booked, &transaction_ref)
                    .await;
                return Err(AppError::InvalidBookingState(format!(
                    "booking {} is no longer pending",
                    booking.booking_number
                )));
            }
            Err(e) => {
                self.compensate(&booking, leases, &booked, &transaction_ref)
                    .await;
                return Err(e);
            }
        };

        let payment = Payment::new(
            confirmed.id,
            PaymentKind::Charge,
            confirmed.total_amount,
            self.gateway.method(),
        )
        .succeeded(transaction_ref);

        let recorded = with_store_retry(self.retry, "record charge", || {
            self.payments.create(&payment)
        })
        .await;

        let payment = match recorded {
            Ok(recorded) => recorded,
            Err(e) => {
                // The booking is confirmed and paid; only the audit row is missing
                error!(
                    "Charge {:?} for {} not recorded: {}",
                    payment.transaction_ref, confirmed.booking_number, e
                );
                payment
            }
        };

        for lease in leases {
            self.broadcaster.publish(
                vehicle.id,
                &SeatEvent::booked(vehicle.id, lease.seat.seat_number.clone()),
            );
        }

        self.notifier
            .send(
                NotificationKind::BookingConfirmed,
                &confirmed.contact_email,
                json!({
                    "booking_number": confirmed.booking_number,
                    "route": vehicle.route_label(),
                    "operator": vehicle.operator_name,
                    "vehicle_number": vehicle.vehicle_number,
                    "departs_at": vehicle.departs_at,
                    "seats": confirmed.seat_numbers,
                    "passengers": confirmed.passengers,
                    "total_amount": confirmed.total_amount,
                }),
            )
            .await;

        info!(
            "Booking {} confirmed for {}: {} seats, total {}",
            confirmed.booking_number,
            caller,
            leases.len(),
            confirmed.total_amount
        );

        Ok(BookingReceipt {
            booking: confirmed,
            payment,
        })
    }

    /// Undo a paid attempt that could not be confirmed
    async fn compensate(
        &self,
        booking: &Booking,
        leases: &[Lease],
        booked: &[SeatId],
        transaction_ref: &str,
    ) {
        warn!(
            "Compensating booking {}: releasing seats and refunding {}",
            booking.booking_number, booking.total_amount
        );

        self.release_all(leases, booked).await;

        match self
            .gateway
            .refund(booking.total_amount, &booking.booking_number)
            .await
        {
            PaymentOutcome::Success {
                transaction_ref: refund_ref,
            } => info!(
                "Refunded charge {} of {} with {}",
                transaction_ref, booking.booking_number, refund_ref
            ),
            PaymentOutcome::Failure { reason } => error!(
                "Refund of charge {} for {} failed, needs reconciliation: {}",
                transaction_ref, booking.booking_number, reason
            ),
        }

        self.discard(booking).await;
    }

    /// Return every seat of the attempt to available.
    ///
    /// Seats in `booked` go through the booked→available transition, the rest
    /// through a release of this attempt's lease.
    async fn release_all(&self, leases: &[Lease], booked: &[SeatId]) {
        for lease in leases {
            let id = &lease.seat;
            let result = if booked.contains(id) {
                with_store_retry(self.retry, "release booked seat", || {
                    self.locks.release_booked(id)
                })
                .await
            } else {
                with_store_retry(self.retry, "release seat", || self.locks.release_lease(lease))
                    .await
            };

            match result {
                Ok(LockOutcome::Granted(_)) => {
                    self.broadcaster.publish(
                        id.vehicle_id,
                        &SeatEvent::unlocked(id.vehicle_id, id.seat_number.clone()),
                    );
                }
                // Already reaped, or a newer lock that is not ours to free
                Ok(LockOutcome::Denied(_)) => {}
                Err(e) => error!("Could not release {}: {}", id, e),
            }
        }
    }

    /// Drop a pending booking that will never be confirmed
    async fn discard(&self, booking: &Booking) {
        match with_store_retry(self.retry, "discard booking", || {
            self.bookings.delete(booking.id)
        })
        .await
        {
            Ok(_) => info!("Discarded pending booking {}", booking.booking_number),
            Err(e) => error!(
                "Pending booking {} could not be discarded: {}",
                booking.booking_number, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_number_format() {
        let number = generate_booking_number("CB");
        assert_eq!(number.len(), 2 + 14 + 6);
        assert!(number.starts_with("CB"));
        assert!(number[2..16].chars().all(|c| c.is_ascii_digit()));
        assert!(number[16..]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn test_booking_numbers_differ() {
        let a = generate_booking_number("CB");
        let b = generate_booking_number("CB");
        assert_ne!(a, b);
    }
}
