//! Travel reminders
//!
//! Sends one `travel_reminder` notification per confirmed booking departing
//! within the next day. The booking is marked reminded right after the send,
//! so a restart does not repeat it.
//!
//! The same sweep closes out trips: confirmed bookings on a vehicle that has
//! arrived become `completed` and can no longer be cancelled.

use crate::notifier::BestEffortNotifier;
use chrono::{DateTime, Duration, Utc};
use coach_core::{
    models::{BookingStatus, NotificationKind},
    traits::{BookingRepository, VehicleRepository},
    AppResult,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// How far ahead of departure reminders go out
pub fn reminder_horizon() -> Duration {
    Duration::hours(24)
}

/// Departures older than this are not revisited when completing trips
pub fn completion_lookback() -> Duration {
    Duration::days(7)
}

pub struct TravelReminders {
    vehicles: Arc<dyn VehicleRepository>,
    bookings: Arc<dyn BookingRepository>,
    notifier: BestEffortNotifier,
    every: std::time::Duration,
    shutdown: watch::Receiver<bool>,
}

impl TravelReminders {
    /// Returns the reminder loop and its shutdown sender
    pub fn new(
        vehicles: Arc<dyn VehicleRepository>,
        bookings: Arc<dyn BookingRepository>,
        notifier: BestEffortNotifier,
        every: std::time::Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reminders = Self {
            vehicles,
            bookings,
            notifier,
            every,
            shutdown: shutdown_rx,
        };
        (reminders, shutdown_tx)
    }

    /// Remind every confirmed booking departing in `[now, now + 24h)`; returns how many were sent
    pub async fn send_due(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let departing = self
            .vehicles
            .list_departing_between(now, now + reminder_horizon())
            .await?;

        let mut sent = 0;
        for vehicle in departing {
            let bookings = self.bookings.list_by_vehicle(vehicle.id).await?;

            for booking in bookings
                .into_iter()
                .filter(|b| b.status == BookingStatus::Confirmed && b.reminder_sent_at.is_none())
            {
                let delivered = self
                    .notifier
                    .send(
                        NotificationKind::TravelReminder,
                        &booking.contact_email,
                        json!({
                            "booking_number": booking.booking_number,
                            "route": vehicle.route_label(),
                            "operator": vehicle.operator_name,
                            "vehicle_number": vehicle.vehicle_number,
                            "departs_at": vehicle.departs_at,
                            "seats": booking.seat_numbers,
                        }),
                    )
                    .await;

                // Retried on the next sweep
                if !delivered {
                    continue;
                }

                if self.bookings.mark_reminder_sent(booking.id, now).await? {
                    sent += 1;
                } else {
                    debug!("Reminder for {} already recorded", booking.booking_number);
                }
            }
        }

        if sent > 0 {
            info!("Sent {} travel reminders", sent);
        }
        Ok(sent)
    }

    /// Mark confirmed bookings on vehicles arrived by `now` completed; returns how many changed
    pub async fn complete_arrived(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let departed = self
            .vehicles
            .list_departing_between(now - completion_lookback(), now)
            .await?;

        let mut completed = 0;
        for vehicle in departed.into_iter().filter(|v| v.arrives_at <= now) {
            let bookings = self.bookings.list_by_vehicle(vehicle.id).await?;

            for booking in bookings
                .into_iter()
                .filter(|b| b.status == BookingStatus::Confirmed)
            {
                if self.bookings.complete_if_confirmed(booking.id).await?.is_some() {
                    debug!("Booking {} completed", booking.booking_number);
                    completed += 1;
                }
            }
        }

        if completed > 0 {
            info!("Completed {} bookings after arrival", completed);
        }
        Ok(completed)
    }

    /// Sweep every interval until shutdown
    pub async fn run(self) {
        info!("Travel reminders started (every {:?})", self.every);

        let mut shutdown = self.shutdown.clone();
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Utc::now();
                    if let Err(e) = self.send_due(now).await {
                        error!("Travel reminder sweep failed: {}", e);
                    }
                    if let Err(e) = self.complete_arrived(now).await {
                        error!("Trip completion sweep failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Travel reminders stopped");
    }
}
