//! Lock manager
//!
//! Grants and releases time-bounded exclusive holds on seats. Every operation
//! is a single guarded write against the seat ledger:
//!
//! | operation        | guard                          | next state         |
//! |------------------|--------------------------------|--------------------|
//! | `acquire`        | available                      | locked(holder,ttl) |
//! | `release`        | locked by holder               | available          |
//! | `release_lease`  | this exact lock                | available          |
//! | `confirm`        | this exact lock, not expired   | booked             |
//! | `release_booked` | booked                         | available          |
//! | `reap`           | lock expired                   | available          |
//!
//! Expiry stamps handed out by one manager are unique, so a holder plus an
//! expiry names a single grant. A hold that was reaped and taken again by the
//! same holder carries a new stamp and no longer matches the old lease.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use coach_core::{
    models::{Seat, SeatGuard, SeatId, SeatState},
    traits::{CasOutcome, SeatLedger},
    AppError, AppResult,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Result of a lock operation
#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    /// The transition was applied; carries the seat in its new state
    Granted(Seat),
    /// The seat's state did not allow the transition; carries the seat unchanged
    Denied(Seat),
}

impl LockOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, LockOutcome::Granted(_))
    }

    pub fn seat(&self) -> &Seat {
        match self {
            LockOutcome::Granted(seat) | LockOutcome::Denied(seat) => seat,
        }
    }
}

/// One grant of a hold on a seat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub seat: SeatId,
    pub holder: String,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    /// The lease a locked seat currently carries
    pub fn of(seat: &Seat) -> Option<Self> {
        match &seat.state {
            SeatState::Locked { holder, expires_at } => Some(Self {
                seat: seat.id(),
                holder: holder.clone(),
                expires_at: *expires_at,
            }),
            _ => None,
        }
    }

    fn guard(&self) -> SeatGuard {
        SeatGuard::Lease {
            holder: self.holder.clone(),
            expires_at: self.expires_at,
        }
    }
}

/// Seat lock manager
pub struct LockManager {
    seats: Arc<dyn SeatLedger>,
    ttl: Duration,
    last_expiry: Mutex<DateTime<Utc>>,
}

impl LockManager {
    pub fn new(seats: Arc<dyn SeatLedger>, ttl: Duration) -> Self {
        Self {
            seats,
            ttl,
            last_expiry: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn ledger(&self) -> &Arc<dyn SeatLedger> {
        &self.seats
    }

    /// Expiry for a new grant: now + ttl at microsecond precision, strictly
    /// later than any stamp this manager handed out before
    pub fn next_expiry(&self) -> DateTime<Utc> {
        let wanted = (Utc::now() + self.ttl).trunc_subsecs(6);
        let mut last = self.last_expiry.lock();
        let next = if wanted > *last {
            wanted
        } else {
            *last + Duration::microseconds(1)
        };
        *last = next;
        next
    }

    async fn transition(
        &self,
        id: &SeatId,
        guard: SeatGuard,
        next: SeatState,
    ) -> AppResult<LockOutcome> {
        match self.seats.compare_and_set(id, &guard, next).await? {
            CasOutcome::Applied(seat) => Ok(LockOutcome::Granted(seat)),
            CasOutcome::Rejected(seat) => Ok(LockOutcome::Denied(seat)),
            CasOutcome::NotFound => Err(AppError::SeatNotFound(id.seat_number.clone())),
        }
    }

    /// Claim an available seat for `holder` until now + ttl
    pub async fn acquire(&self, id: &SeatId, holder: &str) -> AppResult<LockOutcome> {
        self.acquire_until(id, holder, self.next_expiry()).await
    }

    /// Claim an available seat for `holder` with a stamp from [`next_expiry`](Self::next_expiry)
    #[instrument(skip(self))]
    pub async fn acquire_until(
        &self,
        id: &SeatId,
        holder: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<LockOutcome> {
        let outcome = self
            .transition(id, SeatGuard::Available, SeatState::locked(holder, expires_at))
            .await?;

        match &outcome {
            LockOutcome::Granted(_) => debug!("Seat {} locked by {} until {}", id, holder, expires_at),
            LockOutcome::Denied(seat) => debug!("Lock on {} denied: {}", id, seat.status()),
        }
        Ok(outcome)
    }

    /// Give back a hold; denied unless `holder` holds the seat
    #[instrument(skip(self))]
    pub async fn release(&self, id: &SeatId, holder: &str) -> AppResult<LockOutcome> {
        self.transition(
            id,
            SeatGuard::HeldBy(holder.to_string()),
            SeatState::Available,
        )
        .await
    }

    /// Give back one specific grant; a newer lock on the seat is left alone
    #[instrument(skip(self))]
    pub async fn release_lease(&self, lease: &Lease) -> AppResult<LockOutcome> {
        self.transition(&lease.seat, lease.guard(), SeatState::Available)
            .await
    }

    /// Turn a still-valid grant into a booking
    #[instrument(skip(self))]
    pub async fn confirm(&self, lease: &Lease) -> AppResult<LockOutcome> {
        self.transition(
            &lease.seat,
            SeatGuard::LiveLease {
                holder: lease.holder.clone(),
                expires_at: lease.expires_at,
                now: Utc::now(),
            },
            SeatState::Booked,
        )
        .await
    }

    /// Return a booked seat to inventory (cancellation, compensation)
    #[instrument(skip(self))]
    pub async fn release_booked(&self, id: &SeatId) -> AppResult<LockOutcome> {
        self.transition(id, SeatGuard::Booked, SeatState::Available)
            .await
    }

    /// Release a hold that ran out at or before `now`
    pub async fn reap(&self, id: &SeatId, now: DateTime<Utc>) -> AppResult<LockOutcome> {
        self.transition(id, SeatGuard::ExpiredAt(now), SeatState::Available)
            .await
    }

    /// Release every hold that ran out at or before `now`; returns the freed seats
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<Vec<Seat>> {
        let candidates = self.seats.expired_locks(now).await?;
        let mut released = Vec::with_capacity(candidates.len());

        for seat in candidates {
            // A candidate may have been released, confirmed or re-locked since the scan
            if let LockOutcome::Granted(seat) = self.reap(&seat.id(), now).await? {
                released.push(seat);
            }
        }

        if !released.is_empty() {
            info!("Reaped {} expired seat locks", released.len());
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::models::{SeatClass, SeatStatus};
    use coach_db::MemorySeatLedger;
    use uuid::Uuid;

    async fn manager(ttl: Duration, numbers: &[&str]) -> (LockManager, Uuid) {
        let ledger = Arc::new(MemorySeatLedger::new());
        let vehicle_id = Uuid::new_v4();
        let seats: Vec<Seat> = numbers
            .iter()
            .map(|n| Seat::new(vehicle_id, *n, SeatClass::Regular))
            .collect();
        ledger.create_seats(&seats).await.unwrap();
        (LockManager::new(ledger, ttl), vehicle_id)
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let (locks, vehicle_id) = manager(Duration::minutes(10), &["1A"]).await;
        let id = SeatId::new(vehicle_id, "1A");

        let first = locks.acquire(&id, "alice").await.unwrap();
        assert!(first.is_granted());
        assert!(first.seat().state.is_held_by("alice"));

        let second = locks.acquire(&id, "bob").await.unwrap();
        assert!(!second.is_granted());
        assert!(second.seat().state.is_held_by("alice"));
    }

    #[tokio::test]
    async fn test_release_requires_holder() {
        let (locks, vehicle_id) = manager(Duration::minutes(10), &["1A"]).await;
        let id = SeatId::new(vehicle_id, "1A");

        locks.acquire(&id, "alice").await.unwrap();
        assert!(!locks.release(&id, "bob").await.unwrap().is_granted());

        let released = locks.release(&id, "alice").await.unwrap();
        assert!(released.is_granted());
        assert_eq!(released.seat().status(), SeatStatus::Available);

        // Releasing again is a plain denial, not an error
        assert!(!locks.release(&id, "alice").await.unwrap().is_granted());
    }

    #[tokio::test]
    async fn test_confirm_requires_unexpired_hold() {
        let (locks, vehicle_id) = manager(Duration::milliseconds(-1), &["1A"]).await;
        let id = SeatId::new(vehicle_id, "1A");

        let granted = locks.acquire(&id, "alice").await.unwrap();
        assert!(granted.is_granted());
        let lease = Lease::of(granted.seat()).unwrap();
        let confirmed = locks.confirm(&lease).await.unwrap();
        assert!(!confirmed.is_granted());
        assert_eq!(confirmed.seat().status(), SeatStatus::Locked);
    }

    #[tokio::test]
    async fn test_confirm_and_release_booked() {
        let (locks, vehicle_id) = manager(Duration::minutes(10), &["1A"]).await;
        let id = SeatId::new(vehicle_id, "1A");

        let lease = Lease::of(locks.acquire(&id, "alice").await.unwrap().seat()).unwrap();
        let booked = locks.confirm(&lease).await.unwrap();
        assert_eq!(booked.seat().status(), SeatStatus::Booked);
        assert_eq!(booked.seat().state.holder(), None);

        // A booked seat is not a lock
        assert!(!locks.release(&id, "alice").await.unwrap().is_granted());

        let freed = locks.release_booked(&id).await.unwrap();
        assert_eq!(freed.seat().status(), SeatStatus::Available);
    }

    #[test]
    fn test_expiry_stamps_are_unique() {
        let ledger = Arc::new(MemorySeatLedger::new());
        let locks = LockManager::new(ledger, Duration::minutes(10));

        let stamps: Vec<_> = (0..100).map(|_| locks.next_expiry()).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert!(stamps.iter().all(|t| t.timestamp_subsec_nanos() % 1000 == 0));
    }

    #[tokio::test]
    async fn test_old_lease_does_not_match_a_new_grant() {
        let (locks, vehicle_id) = manager(Duration::minutes(10), &["1A"]).await;
        let id = SeatId::new(vehicle_id, "1A");

        let first = Lease::of(locks.acquire(&id, "alice").await.unwrap().seat()).unwrap();
        assert!(locks.release(&id, "alice").await.unwrap().is_granted());
        let second = Lease::of(locks.acquire(&id, "alice").await.unwrap().seat()).unwrap();
        assert_ne!(first, second);

        assert!(!locks.confirm(&first).await.unwrap().is_granted());
        assert!(!locks.release_lease(&first).await.unwrap().is_granted());

        let booked = locks.confirm(&second).await.unwrap();
        assert_eq!(booked.seat().status(), SeatStatus::Booked);
    }

    #[tokio::test]
    async fn test_unknown_seat() {
        let (locks, vehicle_id) = manager(Duration::minutes(10), &["1A"]).await;
        let result = locks.acquire(&SeatId::new(vehicle_id, "9Z"), "alice").await;
        assert!(matches!(result, Err(AppError::SeatNotFound(_))));
    }

    #[tokio::test]
    async fn test_sweep_releases_only_expired() {
        let (locks, vehicle_id) = manager(Duration::minutes(10), &["1A", "1B"]).await;
        let a = SeatId::new(vehicle_id, "1A");
        let b = SeatId::new(vehicle_id, "1B");

        locks.acquire(&a, "alice").await.unwrap();
        locks.acquire(&b, "bob").await.unwrap();

        assert!(locks.sweep_expired(Utc::now()).await.unwrap().is_empty());

        let later = Utc::now() + Duration::minutes(11);
        let released = locks.sweep_expired(later).await.unwrap();
        assert_eq!(released.len(), 2);
        assert!(released.iter().all(|s| s.status() == SeatStatus::Available));
    }
}
