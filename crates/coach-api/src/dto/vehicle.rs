//! Vehicle and seat map DTOs

use chrono::{DateTime, NaiveDate, Utc};
use coach_core::models::{Seat, SeatClass, SeatLayout, SeatStatus, VehicleInstance};
use coach_services::ScheduleRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Schedule a vehicle instance (admin)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ScheduleVehicleRequest {
    #[validate(length(min = 1, max = 32, message = "Vehicle number is required"))]
    pub vehicle_number: String,

    #[validate(length(min = 1, max = 100, message = "Operator name is required"))]
    pub operator_name: String,

    #[validate(length(min = 1, max = 100, message = "Origin is required"))]
    pub origin: String,

    #[validate(length(min = 1, max = 100, message = "Destination is required"))]
    pub destination: String,

    pub departs_at: DateTime<Utc>,

    pub arrives_at: DateTime<Utc>,

    #[validate(custom(function = "positive_amount"))]
    pub base_price: Decimal,

    /// Fare of the premium rows; base price when unset
    pub premium_price: Option<Decimal>,

    #[validate(range(min = 1, max = 60, message = "A vehicle has 1 to 60 seats"))]
    pub total_seats: i32,

    #[serde(default)]
    pub layout: SeatLayout,
}

fn positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_positive() && !amount.is_zero() {
        Ok(())
    } else {
        Err(ValidationError::new("positive_amount"))
    }
}

impl From<ScheduleVehicleRequest> for ScheduleRequest {
    fn from(req: ScheduleVehicleRequest) -> Self {
        ScheduleRequest {
            vehicle_number: req.vehicle_number.trim().to_string(),
            operator_name: req.operator_name.trim().to_string(),
            origin: req.origin.trim().to_string(),
            destination: req.destination.trim().to_string(),
            departs_at: req.departs_at,
            arrives_at: req.arrives_at,
            base_price: req.base_price,
            premium_price: req.premium_price,
            total_seats: req.total_seats,
            layout: req.layout,
        }
    }
}

/// Vehicle instance as shown to callers
#[derive(Debug, Clone, Serialize)]
pub struct VehicleResponse {
    pub id: Uuid,
    pub vehicle_number: String,
    pub operator_name: String,
    pub route: String,
    pub origin: String,
    pub destination: String,
    pub travel_date: NaiveDate,
    pub departs_at: DateTime<Utc>,
    pub arrives_at: DateTime<Utc>,
    pub base_price: Decimal,
    pub total_seats: i32,
    pub layout: SeatLayout,
}

impl From<VehicleInstance> for VehicleResponse {
    fn from(v: VehicleInstance) -> Self {
        Self {
            route: v.route_label(),
            id: v.id,
            vehicle_number: v.vehicle_number,
            operator_name: v.operator_name,
            origin: v.origin,
            destination: v.destination,
            travel_date: v.travel_date,
            departs_at: v.departs_at,
            arrives_at: v.arrives_at,
            base_price: v.base_price,
            total_seats: v.total_seats,
            layout: v.layout,
        }
    }
}

/// One seat of a seat map.
///
/// Holder identities are never exposed; `held_by_you` tells the viewer whether a
/// lock is theirs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeatView {
    pub seat_number: String,
    pub status: SeatStatus,
    pub seat_class: SeatClass,
    pub fare: Decimal,
    pub row: i32,
    pub column: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    pub held_by_you: bool,
}

impl SeatView {
    pub fn new(seat: &Seat, base_price: Decimal, viewer: &str) -> Self {
        Self {
            seat_number: seat.seat_number.clone(),
            status: seat.status(),
            seat_class: seat.seat_class,
            fare: seat.fare(base_price),
            row: seat.row,
            column: seat.column,
            locked_until: seat.state.expires_at(),
            held_by_you: seat.state.is_held_by(viewer),
        }
    }
}

/// Seat map of a vehicle instance
#[derive(Debug, Clone, Serialize)]
pub struct SeatMapResponse {
    pub vehicle_id: Uuid,
    pub available: usize,
    pub seats: Vec<SeatView>,
}

impl SeatMapResponse {
    pub fn new(vehicle: &VehicleInstance, seats: &[Seat], viewer: &str) -> Self {
        let seats: Vec<SeatView> = seats
            .iter()
            .map(|s| SeatView::new(s, vehicle.base_price, viewer))
            .collect();
        Self {
            vehicle_id: vehicle.id,
            available: seats
                .iter()
                .filter(|s| s.status == SeatStatus::Available)
                .count(),
            seats,
        }
    }
}

/// Vehicle plus its freshly created seats
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledVehicleResponse {
    pub vehicle: VehicleResponse,
    pub seats: Vec<SeatView>,
}
