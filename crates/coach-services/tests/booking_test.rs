mod common;

use chrono::{Duration, Utc};
use coach_core::config::BookingConfig;
use coach_core::models::{
    BookingStatus, NotificationKind, PaymentKind, PaymentStatus, SeatEvent, SeatId, SeatStatus,
};
use coach_core::traits::{Repository, SeatLedger};
use coach_core::AppError;
use coach_services::{BookingEngine, LogNotifier};
use common::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

async fn statuses(engine: &BookingEngine, vehicle_id: Uuid, list: &[&str]) -> Vec<SeatStatus> {
    let mut out = Vec::new();
    for seat in list {
        let seat = engine
            .stores
            .seats
            .get_seat(&SeatId::new(vehicle_id, *seat))
            .await
            .unwrap()
            .unwrap();
        out.push(seat.status());
    }
    out
}

#[tokio::test]
async fn reserve_book_and_cancel_end_to_end() {
    let Harness { engine, gateway } = harness();
    let vehicle_id = schedule(&engine, 2, Duration::hours(25) + Duration::minutes(5)).await;

    let outcome = engine
        .reserve_seats(vehicle_id, &seats(&["1A", "1B"]), "traveller-x")
        .await
        .unwrap();
    assert!(outcome.is_reserved());

    let receipt = engine
        .confirm_booking("traveller-x", booking_request(vehicle_id, &["1A", "1B"]))
        .await
        .unwrap();
    assert_eq!(receipt.booking.status, BookingStatus::Confirmed);
    assert_eq!(receipt.booking.total_amount, dec!(800));
    assert_eq!(receipt.payment.kind, PaymentKind::Charge);
    assert_eq!(receipt.payment.amount, dec!(800));
    assert_eq!(
        statuses(&engine, vehicle_id, &["1A", "1B"]).await,
        vec![SeatStatus::Booked, SeatStatus::Booked]
    );
    assert_eq!(*gateway.charges.lock(), vec![dec!(800)]);

    let cancelled = engine
        .cancel_booking(receipt.booking.id, "traveller-x", None)
        .await
        .unwrap();
    assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.refund_amount, dec!(720));
    assert_eq!(cancelled.booking.refund_amount, Some(dec!(720)));
    assert!(cancelled.refund_settled);
    assert_eq!(
        statuses(&engine, vehicle_id, &["1A", "1B"]).await,
        vec![SeatStatus::Available, SeatStatus::Available]
    );

    let payments = engine
        .stores
        .payments
        .list_by_booking(receipt.booking.id)
        .await
        .unwrap();
    let kinds: Vec<_> = payments.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PaymentKind::Charge, PaymentKind::Refund]);
}

#[tokio::test]
async fn declined_payment_leaves_no_booking_and_frees_seats() {
    let Harness { engine, .. } = harness_with(
        ScriptedGateway::declining(),
        Arc::new(LogNotifier),
        booking_config(),
    );
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    let mut viewer = engine.broadcaster.connect();
    engine.broadcaster.join(viewer.id, vehicle_id);

    let result = engine
        .confirm_booking("traveller-y", booking_request(vehicle_id, &["1A", "1B"]))
        .await;
    match result {
        Err(e @ AppError::PaymentDeclined(_)) => assert!(e.is_retryable()),
        other => panic!("expected a declined payment, got {:?}", other),
    }

    assert_eq!(
        statuses(&engine, vehicle_id, &["1A", "1B"]).await,
        vec![SeatStatus::Available, SeatStatus::Available]
    );
    assert_eq!(engine.stores.bookings.count().await.unwrap(), 0);

    // Locked, then unlocked again, per seat
    let mut events = Vec::new();
    while let Ok(event) = viewer.receiver.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            SeatEvent::locked(vehicle_id, "1A"),
            SeatEvent::locked(vehicle_id, "1B"),
            SeatEvent::unlocked(vehicle_id, "1A"),
            SeatEvent::unlocked(vehicle_id, "1B"),
        ]
    );
}

#[tokio::test]
async fn hold_lost_during_payment_is_refunded() {
    let config = BookingConfig {
        lock_ttl_secs: 1,
        ..booking_config()
    };
    let gateway = ScriptedGateway {
        charge_delay: std::time::Duration::from_millis(1300),
        ..ScriptedGateway::default()
    };
    let Harness { engine, gateway } = harness_with(gateway, Arc::new(LogNotifier), config);
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    let result = engine
        .confirm_booking("slow-payer", booking_request(vehicle_id, &["2A", "2B"]))
        .await;
    assert!(matches!(result, Err(AppError::SeatNotHeld(_))));

    assert_eq!(*gateway.charges.lock(), vec![dec!(800)]);
    assert_eq!(*gateway.refunds.lock(), vec![dec!(800)]);
    assert_eq!(
        statuses(&engine, vehicle_id, &["2A", "2B"]).await,
        vec![SeatStatus::Available, SeatStatus::Available]
    );
    assert_eq!(engine.stores.bookings.count().await.unwrap(), 0);
}

#[tokio::test]
async fn relocking_a_reaped_seat_does_not_rescue_the_payment() {
    let config = BookingConfig {
        lock_ttl_secs: 1,
        ..booking_config()
    };
    let gateway = ScriptedGateway {
        charge_delay: std::time::Duration::from_millis(1800),
        ..ScriptedGateway::default()
    };
    let Harness { engine, gateway } = harness_with(gateway, Arc::new(LogNotifier), config);
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    let booking = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .confirm_booking("traveller-x", booking_request(vehicle_id, &["1A"]))
                .await
        })
    };

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    let reaped = engine.locks.sweep_expired(Utc::now()).await.unwrap();
    assert_eq!(reaped.len(), 1);

    // Someone else grabs and drops the seat, then the same caller locks it from a second tab
    assert!(engine
        .reserve_seats(vehicle_id, &seats(&["1A"]), "traveller-y")
        .await
        .unwrap()
        .is_reserved());
    engine
        .unlock_seats(vehicle_id, &seats(&["1A"]), "traveller-y")
        .await
        .unwrap();
    assert!(engine
        .reserve_seats(vehicle_id, &seats(&["1A"]), "traveller-x")
        .await
        .unwrap()
        .is_reserved());

    let result = booking.await.unwrap();
    assert!(matches!(result, Err(AppError::SeatNotHeld(n)) if n == "1A"));
    assert_eq!(*gateway.refunds.lock(), vec![dec!(400)]);
    assert_eq!(engine.stores.bookings.count().await.unwrap(), 0);

    // The second tab's lock is not the failed attempt's to release
    let seat = engine
        .stores
        .seats
        .get_seat(&SeatId::new(vehicle_id, "1A"))
        .await
        .unwrap()
        .unwrap();
    assert!(seat.state.is_held_by("traveller-x"));
}

#[tokio::test]
async fn booking_taken_seats_is_rejected_without_a_record() {
    let Harness { engine, gateway } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    engine
        .reserve_seats(vehicle_id, &seats(&["1B"]), "someone-else")
        .await
        .unwrap();

    let result = engine
        .confirm_booking("traveller", booking_request(vehicle_id, &["1A", "1B"]))
        .await;
    assert_eq!(result.unwrap_err(), AppError::SeatsUnavailable(seats(&["1B"])));
    assert!(gateway.charges.lock().is_empty());
    assert_eq!(engine.stores.bookings.count().await.unwrap(), 0);
}

#[tokio::test]
async fn booking_validation() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    let empty = engine
        .confirm_booking("t", booking_request(vehicle_id, &[]))
        .await;
    assert_eq!(empty.unwrap_err(), AppError::EmptySeatSelection);

    let foreign = engine
        .confirm_booking("t", booking_request(vehicle_id, &["1A", "9A"]))
        .await;
    assert!(matches!(foreign, Err(AppError::SeatNotFound(n)) if n == "9A"));

    let unknown = engine
        .confirm_booking("t", booking_request(Uuid::new_v4(), &["1A"]))
        .await;
    assert!(matches!(unknown, Err(AppError::VehicleNotFound(_))));

    let mut nobody = booking_request(vehicle_id, &["1A"]);
    nobody.passengers.clear();
    assert!(matches!(
        engine.confirm_booking("t", nobody).await,
        Err(AppError::Validation(_))
    ));

    // Nothing was left locked
    assert_eq!(
        statuses(&engine, vehicle_id, &["1A"]).await,
        vec![SeatStatus::Available]
    );
}

#[tokio::test]
async fn cancellation_window_is_measured_from_departure() {
    let Harness { engine, .. } = harness();
    let soon = schedule(&engine, 4, Duration::hours(23)).await;

    let receipt = engine
        .confirm_booking("traveller", booking_request(soon, &["1A", "1B"]))
        .await
        .unwrap();

    let result = engine
        .cancel_booking(receipt.booking.id, "traveller", None)
        .await;
    assert!(matches!(
        result,
        Err(AppError::CancellationWindowExpired {
            hours_remaining: 22,
            cutoff_hours: 24
        })
    ));

    let booking = engine
        .stores
        .bookings
        .find_by_id(receipt.booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(
        statuses(&engine, soon, &["1A", "1B"]).await,
        vec![SeatStatus::Booked, SeatStatus::Booked]
    );
}

#[tokio::test]
async fn only_the_owner_cancels_and_only_once() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    let receipt = engine
        .confirm_booking("owner", booking_request(vehicle_id, &["1A"]))
        .await
        .unwrap();

    let stranger = engine
        .cancel_booking(receipt.booking.id, "stranger", None)
        .await;
    assert_eq!(stranger.unwrap_err(), AppError::Forbidden);

    engine
        .cancel_booking(receipt.booking.id, "owner", Some("plans changed".to_string()))
        .await
        .unwrap();

    let again = engine
        .cancel_booking(receipt.booking.id, "owner", None)
        .await;
    assert!(matches!(again, Err(AppError::InvalidBookingState(_))));

    let missing = engine.cancel_booking(Uuid::new_v4(), "owner", None).await;
    assert!(matches!(missing, Err(AppError::BookingNotFound(_))));
}

#[tokio::test]
async fn failed_refund_still_cancels() {
    let gateway = ScriptedGateway {
        fail_refunds: true,
        ..ScriptedGateway::default()
    };
    let Harness { engine, .. } = harness_with(gateway, Arc::new(LogNotifier), booking_config());
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    let receipt = engine
        .confirm_booking("traveller", booking_request(vehicle_id, &["1A"]))
        .await
        .unwrap();
    let outcome = engine
        .cancel_booking(receipt.booking.id, "traveller", None)
        .await
        .unwrap();

    assert!(!outcome.refund_settled);
    assert_eq!(outcome.booking.status, BookingStatus::Cancelled);
    assert_eq!(
        statuses(&engine, vehicle_id, &["1A"]).await,
        vec![SeatStatus::Available]
    );

    let payments = engine
        .stores
        .payments
        .list_by_booking(receipt.booking.id)
        .await
        .unwrap();
    let refund = payments
        .iter()
        .find(|p| p.kind == PaymentKind::Refund)
        .unwrap();
    assert_eq!(refund.status, PaymentStatus::Failed);
    assert_eq!(refund.amount, dec!(360));
}

#[tokio::test]
async fn notifications_follow_bookings_and_cancellations() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .withf(|kind, recipient, payload| {
            *kind == NotificationKind::BookingConfirmed
                && recipient == "asha@example.com"
                && payload["seats"][0] == "1C"
        })
        .times(1)
        .returning(|_, _, _| Ok(()));
    notifier
        .expect_notify()
        .withf(|kind, _, payload| {
            *kind == NotificationKind::BookingCancelled && payload["refund_settled"] == true
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let Harness { engine, .. } =
        harness_with(ScriptedGateway::approving(), Arc::new(notifier), booking_config());
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    let receipt = engine
        .confirm_booking("traveller", booking_request(vehicle_id, &["1C"]))
        .await
        .unwrap();
    engine
        .cancel_booking(receipt.booking.id, "traveller", None)
        .await
        .unwrap();
}

#[tokio::test]
async fn notification_failure_does_not_fail_the_booking() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .returning(|_, _, _| Err(AppError::Internal("smtp unreachable".to_string())));

    let Harness { engine, .. } =
        harness_with(ScriptedGateway::approving(), Arc::new(notifier), booking_config());
    let vehicle_id = schedule(&engine, 4, Duration::days(3)).await;

    let receipt = engine
        .confirm_booking("traveller", booking_request(vehicle_id, &["1D"]))
        .await
        .unwrap();
    assert_eq!(receipt.booking.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn travel_reminders_go_out_once() {
    let mut notifier = MockNotifier::new();
    notifier
        .expect_notify()
        .withf(|kind, _, _| *kind == NotificationKind::BookingConfirmed)
        .times(2)
        .returning(|_, _, _| Ok(()));
    notifier
        .expect_notify()
        .withf(|kind, _, payload| {
            *kind == NotificationKind::TravelReminder && payload["seats"][0] == "1A"
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let Harness { engine, .. } =
        harness_with(ScriptedGateway::approving(), Arc::new(notifier), booking_config());
    let tomorrow = schedule(&engine, 4, Duration::hours(6)).await;
    let next_week = schedule(&engine, 4, Duration::days(7)).await;

    engine
        .confirm_booking("a", booking_request(tomorrow, &["1A"]))
        .await
        .unwrap();
    engine
        .confirm_booking("b", booking_request(next_week, &["1A"]))
        .await
        .unwrap();

    let (reminders, _shutdown) = engine.reminders();
    assert_eq!(reminders.send_due(Utc::now()).await.unwrap(), 1);
    assert_eq!(reminders.send_due(Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn bookings_complete_once_the_vehicle_arrives() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 4, Duration::hours(6)).await;

    let receipt = engine
        .confirm_booking("traveller-x", booking_request(vehicle_id, &["1A"]))
        .await
        .unwrap();

    let (reminders, _shutdown) = engine.reminders();
    let now = Utc::now();
    assert_eq!(reminders.complete_arrived(now).await.unwrap(), 0);
    // Departed but still on the road
    assert_eq!(
        reminders.complete_arrived(now + Duration::hours(8)).await.unwrap(),
        0
    );

    let after_arrival = now + Duration::hours(17);
    assert_eq!(reminders.complete_arrived(after_arrival).await.unwrap(), 1);
    assert_eq!(reminders.complete_arrived(after_arrival).await.unwrap(), 0);

    let booking = engine
        .stores
        .bookings
        .find_by_id(receipt.booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);
    assert!(booking.status.is_paid());
}

#[tokio::test]
async fn analytics_count_revenue_of_paid_bookings() {
    let Harness { engine, .. } = harness();
    let vehicle_id = schedule(&engine, 8, Duration::days(3)).await;

    let first = engine
        .confirm_booking("a", booking_request(vehicle_id, &["1A", "1B"]))
        .await
        .unwrap();
    engine
        .confirm_booking("b", booking_request(vehicle_id, &["2A"]))
        .await
        .unwrap();
    engine
        .cancel_booking(first.booking.id, "a", None)
        .await
        .unwrap();

    let report = engine.analytics.booking_analytics().await.unwrap();
    assert_eq!(report.total_bookings, 2);
    assert_eq!(report.total_revenue, dec!(400));
    assert_eq!(report.by_status.confirmed, 1);
    assert_eq!(report.by_status.cancelled, 1);
    assert_eq!(report.monthly.len(), 1);
}
