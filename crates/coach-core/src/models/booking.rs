//! Booking and payment models
//!
//! A booking is the durable record of a purchased seat set; payments are the
//! charge and refund attempts tied to it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Booking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Seats held, payment in flight
    #[default]
    Pending,
    /// Paid; seats booked
    Confirmed,
    /// Cancelled by the traveller; seats returned
    Cancelled,
    /// Journey completed
    Completed,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
            BookingStatus::Completed => write!(f, "completed"),
        }
    }
}

impl BookingStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    /// Whether the booking counts toward revenue
    pub fn is_paid(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Traveller on a booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub age: u8,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Booking entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,

    /// Human-presentable, globally unique reference
    pub booking_number: String,

    /// Caller identity of the purchaser
    pub user_id: String,

    pub vehicle_id: Uuid,

    pub seat_numbers: Vec<String>,

    pub passengers: Vec<Passenger>,

    /// Where confirmations and reminders go
    pub contact_email: String,

    pub total_amount: Decimal,

    pub status: BookingStatus,

    /// Transaction reference of the successful charge
    pub payment_ref: Option<String>,

    pub travel_date: NaiveDate,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub refund_amount: Option<Decimal>,

    pub cancelled_at: Option<DateTime<Utc>>,

    pub cancellation_reason: Option<String>,

    pub reminder_sent_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Create a new pending booking
    #[allow(clippy::too_many_arguments)]
    pub fn new_pending(
        booking_number: String,
        user_id: String,
        vehicle_id: Uuid,
        seat_numbers: Vec<String>,
        passengers: Vec<Passenger>,
        contact_email: String,
        total_amount: Decimal,
        travel_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_number,
            user_id,
            vehicle_id,
            seat_numbers,
            passengers,
            contact_email,
            total_amount,
            status: BookingStatus::Pending,
            payment_ref: None,
            travel_date,
            created_at: now,
            updated_at: now,
            refund_amount: None,
            cancelled_at: None,
            cancellation_reason: None,
            reminder_sent_at: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Charge or refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    #[default]
    Charge,
    Refund,
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentKind::Charge => write!(f, "charge"),
            PaymentKind::Refund => write!(f, "refund"),
        }
    }
}

impl PaymentKind {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "charge" => Some(PaymentKind::Charge),
            "refund" => Some(PaymentKind::Refund),
            _ => None,
        }
    }
}

/// Outcome of a payment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Succeeded,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Succeeded => write!(f, "succeeded"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl PaymentStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "succeeded" => Some(PaymentStatus::Succeeded),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

/// Payment attempt record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub kind: PaymentKind,
    pub amount: Decimal,
    pub method: String,
    /// External transaction reference, absent when the gateway returned none
    pub transaction_ref: Option<String>,
    pub status: PaymentStatus,
    /// Gateway failure reason
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(booking_id: Uuid, kind: PaymentKind, amount: Decimal, method: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            kind,
            amount,
            method: method.to_string(),
            transaction_ref: None,
            status: PaymentStatus::Succeeded,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn succeeded(mut self, transaction_ref: String) -> Self {
        self.status = PaymentStatus::Succeeded;
        self.transaction_ref = Some(transaction_ref);
        self
    }

    pub fn failed(mut self, reason: String) -> Self {
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_round_trip_strings() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
            BookingStatus::Completed,
        ] {
            assert_eq!(BookingStatus::from_str(&status.to_string()), Some(status));
        }
        assert_eq!(BookingStatus::from_str("failed"), None);
    }

    #[test]
    fn test_paid_statuses() {
        assert!(BookingStatus::Confirmed.is_paid());
        assert!(BookingStatus::Completed.is_paid());
        assert!(!BookingStatus::Pending.is_paid());
        assert!(!BookingStatus::Cancelled.is_paid());
    }

    #[test]
    fn test_new_pending_booking() {
        let booking = Booking::new_pending(
            "CB20250110000000ABC123".to_string(),
            "user-1".to_string(),
            Uuid::new_v4(),
            vec!["1A".to_string(), "1B".to_string()],
            vec![],
            "traveller@example.com".to_string(),
            dec!(800),
            NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
        );

        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.is_owned_by("user-1"));
        assert!(!booking.is_owned_by("user-2"));
        assert!(booking.refund_amount.is_none());
    }

    #[test]
    fn test_payment_builders() {
        let booking_id = Uuid::new_v4();
        let ok = Payment::new(booking_id, PaymentKind::Charge, dec!(800), "mock_payment")
            .succeeded("TXN1".to_string());
        assert_eq!(ok.status, PaymentStatus::Succeeded);
        assert_eq!(ok.transaction_ref.as_deref(), Some("TXN1"));

        let failed = Payment::new(booking_id, PaymentKind::Refund, dec!(720), "mock_payment")
            .failed("gateway timeout".to_string());
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert_eq!(failed.kind, PaymentKind::Refund);
    }
}
