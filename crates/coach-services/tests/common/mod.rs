#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use coach_core::config::BookingConfig;
use coach_core::models::{Gender, NotificationKind, Passenger, SeatLayout};
use coach_core::traits::{Notifier, PaymentGateway, PaymentOutcome};
use coach_core::AppError;
use coach_db::Stores;
use coach_services::{BookingEngine, BookingRequest, LogNotifier, ScheduleRequest};
use mockall::mock;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

mock! {
    pub Notifier {}

    #[async_trait]
    impl Notifier for Notifier {
        async fn notify(
            &self,
            kind: NotificationKind,
            recipient: &str,
            payload: serde_json::Value,
        ) -> Result<(), AppError>;
    }
}

/// Gateway answering from a script, recording every call
#[derive(Default)]
pub struct ScriptedGateway {
    pub decline_charges: bool,
    pub fail_refunds: bool,
    pub charge_delay: std::time::Duration,
    pub charges: Mutex<Vec<Decimal>>,
    pub refunds: Mutex<Vec<Decimal>>,
}

impl ScriptedGateway {
    pub fn approving() -> Self {
        Self::default()
    }

    pub fn declining() -> Self {
        Self {
            decline_charges: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn method(&self) -> &str {
        "scripted"
    }

    async fn charge(&self, amount: Decimal, reference: &str) -> PaymentOutcome {
        if !self.charge_delay.is_zero() {
            tokio::time::sleep(self.charge_delay).await;
        }
        self.charges.lock().push(amount);

        if self.decline_charges {
            PaymentOutcome::Failure {
                reason: "insufficient funds".to_string(),
            }
        } else {
            PaymentOutcome::Success {
                transaction_ref: format!("TXN-{}", reference),
            }
        }
    }

    async fn refund(&self, amount: Decimal, reference: &str) -> PaymentOutcome {
        self.refunds.lock().push(amount);

        if self.fail_refunds {
            PaymentOutcome::Failure {
                reason: "refund rail offline".to_string(),
            }
        } else {
            PaymentOutcome::Success {
                transaction_ref: format!("RFD-{}", reference),
            }
        }
    }
}

pub fn booking_config() -> BookingConfig {
    BookingConfig {
        store_retry_backoff_ms: 1,
        ..BookingConfig::default()
    }
}

pub struct Harness {
    pub engine: Arc<BookingEngine>,
    pub gateway: Arc<ScriptedGateway>,
}

pub fn harness_with(
    gateway: ScriptedGateway,
    notifier: Arc<dyn Notifier>,
    config: BookingConfig,
) -> Harness {
    let gateway = Arc::new(gateway);
    let engine = Arc::new(BookingEngine::new(
        Stores::memory(),
        gateway.clone(),
        notifier,
        &config,
    ));
    Harness { engine, gateway }
}

pub fn harness() -> Harness {
    harness_with(
        ScriptedGateway::approving(),
        Arc::new(LogNotifier),
        booking_config(),
    )
}

/// Schedule a 2+2 coach at 400 per seat departing after `departs_in`
pub async fn schedule(engine: &BookingEngine, total_seats: i32, departs_in: Duration) -> Uuid {
    let departs_at = Utc::now() + departs_in;
    engine
        .scheduler
        .schedule(ScheduleRequest {
            vehicle_number: "KA-01-F-2024".to_string(),
            operator_name: "Konkan Express".to_string(),
            origin: "Mumbai".to_string(),
            destination: "Goa".to_string(),
            departs_at,
            arrives_at: departs_at + Duration::hours(10),
            base_price: dec!(400),
            premium_price: None,
            total_seats,
            layout: SeatLayout::TwoByTwo,
        })
        .await
        .expect("schedule vehicle")
        .vehicle
        .id
}

pub fn seats(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn booking_request(vehicle_id: Uuid, seat_numbers: &[&str]) -> BookingRequest {
    BookingRequest {
        vehicle_id,
        seat_numbers: seats(seat_numbers),
        passengers: vec![Passenger {
            name: "Asha Rao".to_string(),
            age: 34,
            gender: Gender::Female,
            email: None,
            phone: None,
        }],
        contact_email: "asha@example.com".to_string(),
    }
}
