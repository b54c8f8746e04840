//! Reservation coordinator
//!
//! All-or-nothing acquisition of a seat set. Seats are claimed in ascending
//! seat order; on the first denial everything this attempt claimed is released
//! again and the caller learns which seats were unavailable.
//!
//! Every seat an attempt claims carries the same expiry stamp. A retried claim
//! that finds the seat locked under that stamp was applied by an earlier try
//! whose reply got lost, and belongs to the attempt like any other grant.

use crate::broadcaster::SeatBroadcaster;
use crate::lock_manager::{Lease, LockManager, LockOutcome};
use crate::retry::{with_store_retry, RetryPolicy};
use chrono::{DateTime, Utc};
use coach_core::{
    models::{Seat, SeatEvent, SeatId, SeatStatus},
    AppError, AppResult,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Result of a reservation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum ReservationOutcome {
    /// Every requested seat is now held by the caller; the seats carry the
    /// leases they are held under
    Reserved(Vec<Seat>),
    /// Nothing is held; these seats could not be claimed
    PartiallyUnavailable(Vec<String>),
}

impl ReservationOutcome {
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationOutcome::Reserved(_))
    }
}

/// Normalised request: unique seat ids in lock order
pub fn seat_set(vehicle_id: Uuid, seat_numbers: &[String]) -> Vec<SeatId> {
    seat_numbers
        .iter()
        .map(|n| SeatId::new(vehicle_id, n.trim()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct ReservationCoordinator {
    locks: Arc<LockManager>,
    broadcaster: Arc<SeatBroadcaster>,
    retry: RetryPolicy,
}

impl ReservationCoordinator {
    pub fn new(locks: Arc<LockManager>, broadcaster: Arc<SeatBroadcaster>, retry: RetryPolicy) -> Self {
        Self {
            locks,
            broadcaster,
            retry,
        }
    }

    /// Claim every seat in `seat_numbers` for `holder`, or none of them.
    ///
    /// Seats `holder` already holds with an unexpired lock count as claimed; they
    /// are neither re-acquired nor released if the attempt fails.
    #[instrument(skip(self, seat_numbers), fields(seats = seat_numbers.len()))]
    pub async fn reserve(
        &self,
        vehicle_id: Uuid,
        seat_numbers: &[String],
        holder: &str,
    ) -> AppResult<ReservationOutcome> {
        let ids = seat_set(vehicle_id, seat_numbers);
        if ids.is_empty() {
            return Err(AppError::EmptySeatSelection);
        }

        let expires_at = self.locks.next_expiry();
        let mut held: Vec<Seat> = Vec::with_capacity(ids.len());
        let mut acquired: Vec<Lease> = Vec::new();
        let mut unavailable: Vec<String> = Vec::new();

        for (index, id) in ids.iter().enumerate() {
            let outcome = match self.acquire(id, holder, expires_at).await {
                Ok(outcome) => outcome,
                Err(AppError::SeatNotFound(number)) => {
                    self.roll_back(&acquired).await;
                    return Err(self.not_found(vehicle_id, number).await);
                }
                Err(e) => {
                    self.roll_back(&acquired).await;
                    return Err(e);
                }
            };

            match outcome {
                LockOutcome::Granted(seat) => {
                    acquired.push(Lease {
                        seat: id.clone(),
                        holder: holder.to_string(),
                        expires_at,
                    });
                    held.push(seat);
                }
                // Applied by a try whose reply was lost
                LockOutcome::Denied(seat) if seat.state.is_lease(holder, expires_at) => {
                    acquired.push(Lease {
                        seat: id.clone(),
                        holder: holder.to_string(),
                        expires_at,
                    });
                    held.push(seat);
                }
                LockOutcome::Denied(seat) if seat.state.is_held_by_at(holder, Utc::now()) => {
                    held.push(seat);
                }
                LockOutcome::Denied(_) => {
                    unavailable.push(id.seat_number.clone());
                    // Report the rest without claiming anything more
                    for rest in &ids[index + 1..] {
                        match self.locks.ledger().get_seat(rest).await {
                            Ok(Some(seat)) => {
                                let free = seat.status() == SeatStatus::Available
                                    || seat.state.is_held_by_at(holder, Utc::now());
                                if !free {
                                    unavailable.push(rest.seat_number.clone());
                                }
                            }
                            Ok(None) => unavailable.push(rest.seat_number.clone()),
                            Err(e) => warn!("Could not read {} while reporting: {}", rest, e),
                        }
                    }
                    break;
                }
            }
        }

        if !unavailable.is_empty() {
            self.roll_back(&acquired).await;
            warn!(
                "Reservation on {} for {} failed, unavailable: {:?}",
                vehicle_id, holder, unavailable
            );
            return Ok(ReservationOutcome::PartiallyUnavailable(unavailable));
        }

        for lease in &acquired {
            self.broadcaster.publish(
                vehicle_id,
                &SeatEvent::locked(vehicle_id, lease.seat.seat_number.clone()),
            );
        }

        info!(
            "Reserved {} seats on {} for {} ({} newly locked)",
            held.len(),
            vehicle_id,
            holder,
            acquired.len()
        );
        Ok(ReservationOutcome::Reserved(held))
    }

    /// Explicit unlock of seats held by `holder`; returns the seats released.
    ///
    /// Seats not held by `holder` are skipped.
    #[instrument(skip(self, seat_numbers))]
    pub async fn unlock(
        &self,
        vehicle_id: Uuid,
        seat_numbers: &[String],
        holder: &str,
    ) -> AppResult<Vec<String>> {
        let mut released = Vec::new();

        for id in seat_set(vehicle_id, seat_numbers) {
            let outcome = with_store_retry(self.retry, "release seat", || {
                self.locks.release(&id, holder)
            })
            .await?;

            if outcome.is_granted() {
                self.broadcaster
                    .publish(vehicle_id, &SeatEvent::unlocked(vehicle_id, id.seat_number.clone()));
                released.push(id.seat_number);
            }
        }

        Ok(released)
    }

    async fn acquire(
        &self,
        id: &SeatId,
        holder: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<LockOutcome> {
        with_store_retry(self.retry, "acquire seat", || {
            self.locks.acquire_until(id, holder, expires_at)
        })
        .await
    }

    /// A missing seat on a vehicle without a seat map means the vehicle is unknown
    async fn not_found(&self, vehicle_id: Uuid, seat_number: String) -> AppError {
        match self.locks.ledger().seats_for_vehicle(vehicle_id).await {
            Ok(seats) if seats.is_empty() => AppError::VehicleNotFound(vehicle_id.to_string()),
            _ => AppError::SeatNotFound(seat_number),
        }
    }

    async fn roll_back(&self, acquired: &[Lease]) {
        for lease in acquired {
            let result = with_store_retry(self.retry, "roll back seat", || {
                self.locks.release_lease(lease)
            })
            .await;

            match result {
                Ok(LockOutcome::Granted(_)) => {}
                Ok(LockOutcome::Denied(seat)) => {
                    warn!("Rollback of {} found it {}", lease.seat, seat.status())
                }
                // The reaper frees it once the TTL passes
                Err(e) => error!("Rollback of {} failed: {}", lease.seat, e),
            }
        }
    }
}
