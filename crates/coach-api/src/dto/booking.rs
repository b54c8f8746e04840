//! Booking, payment and cancellation DTOs

use chrono::{DateTime, NaiveDate, Utc};
use coach_core::models::{
    Booking, BookingStatus, Gender, Passenger, Payment, PaymentKind, PaymentStatus,
};
use coach_services::{BookingReceipt, BookingRequest, CancellationOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Traveller details on a booking request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PassengerRequest {
    #[validate(length(min = 1, max = 100, message = "Passenger name is required"))]
    pub name: String,

    #[validate(range(min = 1, max = 120, message = "Passenger age must be between 1 and 120"))]
    pub age: u8,

    pub gender: Gender,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(min = 6, max = 20, message = "Invalid phone number"))]
    pub phone: Option<String>,
}

impl From<PassengerRequest> for Passenger {
    fn from(p: PassengerRequest) -> Self {
        Passenger {
            name: p.name.trim().to_string(),
            age: p.age,
            gender: p.gender,
            email: p.email,
            phone: p.phone,
        }
    }
}

/// Book seats on a vehicle instance
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub vehicle_id: Uuid,

    #[validate(length(min = 1, message = "Select at least one seat"))]
    pub seat_numbers: Vec<String>,

    #[validate(length(min = 1, message = "At least one passenger is required"))]
    #[validate(nested)]
    pub passengers: Vec<PassengerRequest>,

    #[validate(email(message = "Invalid contact email"))]
    pub contact_email: String,
}

impl From<CreateBookingRequest> for BookingRequest {
    fn from(req: CreateBookingRequest) -> Self {
        BookingRequest {
            vehicle_id: req.vehicle_id,
            seat_numbers: req.seat_numbers,
            passengers: req.passengers.into_iter().map(Passenger::from).collect(),
            contact_email: req.contact_email,
        }
    }
}

/// Optional cancellation reason
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CancelBookingRequest {
    #[validate(length(max = 500, message = "Reason is limited to 500 characters"))]
    pub reason: Option<String>,
}

/// Booking as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingResponse {
    pub id: Uuid,
    pub booking_number: String,
    pub vehicle_id: Uuid,
    pub seat_numbers: Vec<String>,
    pub passengers: Vec<Passenger>,
    pub contact_email: String,
    pub total_amount: Decimal,
    pub status: BookingStatus,
    pub payment_ref: Option<String>,
    pub travel_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            booking_number: b.booking_number,
            vehicle_id: b.vehicle_id,
            seat_numbers: b.seat_numbers,
            passengers: b.passengers,
            contact_email: b.contact_email,
            total_amount: b.total_amount,
            status: b.status,
            payment_ref: b.payment_ref,
            travel_date: b.travel_date,
            created_at: b.created_at,
            refund_amount: b.refund_amount,
            cancelled_at: b.cancelled_at,
            cancellation_reason: b.cancellation_reason,
        }
    }
}

/// Payment attempt as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub kind: PaymentKind,
    pub amount: Decimal,
    pub method: String,
    pub transaction_ref: Option<String>,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id,
            kind: p.kind,
            amount: p.amount,
            method: p.method,
            transaction_ref: p.transaction_ref,
            status: p.status,
            failure_reason: p.failure_reason,
            created_at: p.created_at,
        }
    }
}

/// Confirmed booking with its charge
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceiptResponse {
    pub booking: BookingResponse,
    pub payment: PaymentResponse,
}

impl From<BookingReceipt> for BookingReceiptResponse {
    fn from(r: BookingReceipt) -> Self {
        Self {
            booking: r.booking.into(),
            payment: r.payment.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationResponse {
    pub booking: BookingResponse,
    pub refund_amount: Decimal,
    pub refund_settled: bool,
}

impl From<CancellationOutcome> for CancellationResponse {
    fn from(o: CancellationOutcome) -> Self {
        Self {
            booking: o.booking.into(),
            refund_amount: o.refund_amount,
            refund_settled: o.refund_settled,
        }
    }
}
