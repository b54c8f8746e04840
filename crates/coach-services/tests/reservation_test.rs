mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use coach_core::config::BookingConfig;
use coach_core::models::{Seat, SeatEvent, SeatGuard, SeatId, SeatState, SeatStatus};
use coach_core::traits::{CasOutcome, SeatLedger};
use coach_core::AppError;
use coach_db::Stores;
use coach_services::{BookingEngine, LogNotifier, MockPaymentGateway, ReservationOutcome};
use common::*;
use parking_lot::Mutex;
use std::sync::Arc;

async fn status(engine: &BookingEngine, vehicle_id: uuid::Uuid, seat: &str) -> SeatStatus {
    engine
        .stores
        .seats
        .get_seat(&SeatId::new(vehicle_id, seat))
        .await
        .unwrap()
        .unwrap()
        .status()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_grant_a_seat_once() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::days(2)).await;

    let attempts: Vec<_> = (0..16)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .reserve_seats(vehicle_id, &seats(&["1A"]), &format!("caller-{}", i))
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut granted = 0;
    let mut denied = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            ReservationOutcome::Reserved(_) => granted += 1,
            ReservationOutcome::PartiallyUnavailable(unavailable) => {
                assert_eq!(unavailable, seats(&["1A"]));
                denied += 1;
            }
        }
    }

    assert_eq!(granted, 1);
    assert_eq!(denied, 15);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_seat_sets_never_split() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 8, Duration::days(2)).await;

    // Opposite request orders; lock ordering keeps both all-or-nothing
    let a = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .reserve_seats(vehicle_id, &seats(&["1A", "1B", "1C"]), "alice")
                .await
                .unwrap()
        })
    };
    let b = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .reserve_seats(vehicle_id, &seats(&["1C", "1B", "1A"]), "bob")
                .await
                .unwrap()
        })
    };

    let (a, b) = (a.await.unwrap(), b.await.unwrap());
    assert!(a.is_reserved() as u8 + b.is_reserved() as u8 <= 1);

    let map = engine.stores.seats.seats_for_vehicle(vehicle_id).await.unwrap();
    let holders: Vec<_> = map
        .iter()
        .filter(|s| ["1A", "1B", "1C"].contains(&s.seat_number.as_str()))
        .map(|s| s.state.holder().map(str::to_string))
        .collect();
    assert!(holders.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn reservation_is_all_or_nothing() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::days(2)).await;

    engine
        .reserve_seats(vehicle_id, &seats(&["1C"]), "bob")
        .await
        .unwrap();

    let outcome = engine
        .reserve_seats(vehicle_id, &seats(&["1A", "1B", "1C", "1D"]), "alice")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReservationOutcome::PartiallyUnavailable(seats(&["1C"]))
    );

    for seat in ["1A", "1B", "1D"] {
        assert_eq!(status(&engine, vehicle_id, seat).await, SeatStatus::Available);
    }
    assert_eq!(status(&engine, vehicle_id, "1C").await, SeatStatus::Locked);
}

/// Ledger that applies the next lock on one seat and then reports the store as
/// unreachable, as if the reply had been lost on the way back
struct ReplyLosingLedger {
    inner: Arc<dyn SeatLedger>,
    lose_reply_for: Mutex<Option<String>>,
}

#[async_trait]
impl SeatLedger for ReplyLosingLedger {
    async fn get_seat(&self, id: &SeatId) -> Result<Option<Seat>, AppError> {
        self.inner.get_seat(id).await
    }

    async fn set_status(&self, id: &SeatId, state: SeatState) -> Result<Option<Seat>, AppError> {
        self.inner.set_status(id, state).await
    }

    async fn compare_and_set(
        &self,
        id: &SeatId,
        guard: &SeatGuard,
        next: SeatState,
    ) -> Result<CasOutcome, AppError> {
        let locking = matches!(next, SeatState::Locked { .. });
        let outcome = self.inner.compare_and_set(id, guard, next).await?;

        let mut target = self.lose_reply_for.lock();
        if locking && target.as_deref() == Some(id.seat_number.as_str()) {
            *target = None;
            return Err(AppError::StoreUnavailable("connection reset".to_string()));
        }
        Ok(outcome)
    }

    async fn seats_for_vehicle(&self, vehicle_id: uuid::Uuid) -> Result<Vec<Seat>, AppError> {
        self.inner.seats_for_vehicle(vehicle_id).await
    }

    async fn expired_locks(&self, now: DateTime<Utc>) -> Result<Vec<Seat>, AppError> {
        self.inner.expired_locks(now).await
    }

    async fn create_seats(&self, seats: &[Seat]) -> Result<usize, AppError> {
        self.inner.create_seats(seats).await
    }
}

#[tokio::test]
async fn lost_lock_reply_is_still_rolled_back() {
    let memory = Stores::memory();
    let ledger = Arc::new(ReplyLosingLedger {
        inner: memory.seats.clone(),
        lose_reply_for: Mutex::new(None),
    });
    let engine = BookingEngine::new(
        Stores {
            seats: ledger.clone(),
            ..memory
        },
        Arc::new(MockPaymentGateway::default()),
        Arc::new(LogNotifier),
        &booking_config(),
    );
    let vehicle_id = schedule(&engine, 4, Duration::days(2)).await;

    engine
        .reserve_seats(vehicle_id, &seats(&["1B"]), "bob")
        .await
        .unwrap();

    *ledger.lose_reply_for.lock() = Some("1A".to_string());
    let outcome = engine
        .reserve_seats(vehicle_id, &seats(&["1A", "1B"]), "alice")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReservationOutcome::PartiallyUnavailable(seats(&["1B"]))
    );
    assert!(ledger.lose_reply_for.lock().is_none());
    assert_eq!(status(&engine, vehicle_id, "1A").await, SeatStatus::Available);
}

#[tokio::test]
async fn lost_lock_reply_counts_toward_the_reservation() {
    let memory = Stores::memory();
    let ledger = Arc::new(ReplyLosingLedger {
        inner: memory.seats.clone(),
        lose_reply_for: Mutex::new(None),
    });
    let engine = BookingEngine::new(
        Stores {
            seats: ledger.clone(),
            ..memory
        },
        Arc::new(MockPaymentGateway::default()),
        Arc::new(LogNotifier),
        &booking_config(),
    );
    let vehicle_id = schedule(&engine, 4, Duration::days(2)).await;
    let mut viewer = engine.broadcaster.connect();
    engine.broadcaster.join(viewer.id, vehicle_id);

    *ledger.lose_reply_for.lock() = Some("1A".to_string());
    let outcome = engine
        .reserve_seats(vehicle_id, &seats(&["1A"]), "alice")
        .await
        .unwrap();
    assert!(outcome.is_reserved());
    assert_eq!(
        viewer.receiver.try_recv().unwrap(),
        SeatEvent::locked(vehicle_id, "1A")
    );
}

#[tokio::test]
async fn expired_holds_are_recovered_by_the_reaper() {
    let config = BookingConfig {
        lock_ttl_secs: 1,
        reaper_interval_secs: 1,
        ..booking_config()
    };
    let Harness { engine, .. } = harness_with(
        ScriptedGateway::approving(),
        Arc::new(LogNotifier),
        config,
    );
    let vehicle_id = schedule(&engine, 4, Duration::days(2)).await;

    let mut viewer = engine.broadcaster.connect();
    engine.broadcaster.join(viewer.id, vehicle_id);

    engine
        .reserve_seats(vehicle_id, &seats(&["2A"]), "abandoned-session")
        .await
        .unwrap();
    assert_eq!(
        viewer.receiver.recv().await.unwrap(),
        SeatEvent::locked(vehicle_id, "2A")
    );

    let (reaper, shutdown) = engine.reaper();
    let handle = tokio::spawn(reaper.run());

    // TTL plus one reaper interval, with slack
    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
    assert_eq!(status(&engine, vehicle_id, "2A").await, SeatStatus::Available);
    assert_eq!(
        viewer.receiver.recv().await.unwrap(),
        SeatEvent::unlocked(vehicle_id, "2A")
    );

    shutdown.send(true).unwrap();
    handle.await.unwrap();

    // Anyone can take it now
    let outcome = engine
        .reserve_seats(vehicle_id, &seats(&["2A"]), "next-caller")
        .await
        .unwrap();
    assert!(outcome.is_reserved());
}

#[tokio::test]
async fn release_of_unheld_seat_is_a_no_op() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::days(2)).await;

    // Available seat
    let released = engine
        .unlock_seats(vehicle_id, &seats(&["1A"]), "alice")
        .await
        .unwrap();
    assert!(released.is_empty());

    // Someone else's hold
    engine
        .reserve_seats(vehicle_id, &seats(&["1B"]), "bob")
        .await
        .unwrap();
    let released = engine
        .unlock_seats(vehicle_id, &seats(&["1B"]), "alice")
        .await
        .unwrap();
    assert!(released.is_empty());
    assert_eq!(status(&engine, vehicle_id, "1B").await, SeatStatus::Locked);

    // Own hold, twice
    let released = engine
        .unlock_seats(vehicle_id, &seats(&["1B"]), "bob")
        .await
        .unwrap();
    assert_eq!(released, seats(&["1B"]));
    let released = engine
        .unlock_seats(vehicle_id, &seats(&["1B"]), "bob")
        .await
        .unwrap();
    assert!(released.is_empty());
}

#[tokio::test]
async fn lock_events_fan_out_to_the_vehicle_room_only() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::days(2)).await;
    let other_vehicle = schedule(&engine, 4, Duration::days(2)).await;

    let mut viewers: Vec<_> = (0..3).map(|_| engine.broadcaster.connect()).collect();
    for viewer in &viewers {
        engine.broadcaster.join(viewer.id, vehicle_id);
    }
    let mut elsewhere = engine.broadcaster.connect();
    engine.broadcaster.join(elsewhere.id, other_vehicle);

    let outcome = engine
        .reserve_seats(vehicle_id, &seats(&["1A"]), "alice")
        .await
        .unwrap();
    assert!(outcome.is_reserved());

    for viewer in &mut viewers {
        assert_eq!(
            viewer.receiver.try_recv().unwrap(),
            SeatEvent::locked(vehicle_id, "1A")
        );
    }
    assert!(elsewhere.receiver.try_recv().is_err());
}

#[tokio::test]
async fn unknown_vehicle_or_seat_is_not_found() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::days(2)).await;

    let result = engine
        .reserve_seats(vehicle_id, &seats(&["1A", "30Z"]), "alice")
        .await;
    assert!(matches!(result, Err(AppError::SeatNotFound(_))));
    assert_eq!(status(&engine, vehicle_id, "1A").await, SeatStatus::Available);

    let result = engine
        .reserve_seats(uuid::Uuid::new_v4(), &seats(&["1A"]), "alice")
        .await;
    assert!(matches!(result, Err(AppError::VehicleNotFound(_))));
}

#[tokio::test]
async fn stub_backend_reports_not_implemented() {
    let engine = BookingEngine::new(
        Stores::stub(),
        Arc::new(MockPaymentGateway::default()),
        Arc::new(LogNotifier),
        &booking_config(),
    );

    let result = engine
        .reserve_seats(uuid::Uuid::new_v4(), &seats(&["1A"]), "alice")
        .await;
    assert!(matches!(result, Err(AppError::NotImplemented(_))));
}
