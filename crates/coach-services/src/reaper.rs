//! Expired lock reaper
//!
//! Periodically releases seat holds whose TTL has passed and broadcasts the
//! same `seat_unlocked` event an explicit unlock would. Stopped by sending
//! `true` on the shutdown channel returned from [`Reaper::new`].

use crate::broadcaster::SeatBroadcaster;
use crate::lock_manager::LockManager;
use chrono::Utc;
use coach_core::{models::SeatEvent, AppResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

pub struct Reaper {
    locks: Arc<LockManager>,
    broadcaster: Arc<SeatBroadcaster>,
    every: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Reaper {
    /// Returns the reaper and its shutdown sender
    pub fn new(
        locks: Arc<LockManager>,
        broadcaster: Arc<SeatBroadcaster>,
        every: Duration,
    ) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let reaper = Self {
            locks,
            broadcaster,
            every,
            shutdown: shutdown_rx,
        };
        (reaper, shutdown_tx)
    }

    /// One sweep; returns how many holds were released
    pub async fn sweep_once(&self) -> AppResult<usize> {
        let released = self.locks.sweep_expired(Utc::now()).await?;

        for seat in &released {
            self.broadcaster.publish(
                seat.vehicle_id,
                &SeatEvent::unlocked(seat.vehicle_id, seat.seat_number.clone()),
            );
        }

        Ok(released.len())
    }

    /// Sweep every interval until shutdown
    pub async fn run(self) {
        info!("Lock reaper started (every {:?})", self.every);

        let mut shutdown = self.shutdown.clone();
        let mut ticker = interval(self.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!("Lock reaper sweep failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    // Sender dropped counts as shutdown
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Lock reaper stopped");
    }
}
