//! Seat reservation DTOs

use chrono::{DateTime, Utc};
use coach_core::models::Seat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Seats to lock or unlock on one vehicle
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SeatSelectionRequest {
    #[validate(length(min = 1, max = 60, message = "Select between 1 and 60 seats"))]
    pub seat_numbers: Vec<String>,
}

/// Locks granted to the caller
#[derive(Debug, Clone, Serialize)]
pub struct ReservationResponse {
    pub vehicle_id: Uuid,
    pub seat_numbers: Vec<String>,
    /// Earliest expiry among the held seats
    pub locked_until: Option<DateTime<Utc>>,
}

impl ReservationResponse {
    pub fn new(vehicle_id: Uuid, seats: &[Seat]) -> Self {
        Self {
            vehicle_id,
            seat_numbers: seats.iter().map(|s| s.seat_number.clone()).collect(),
            locked_until: seats.iter().filter_map(|s| s.state.expires_at()).min(),
        }
    }
}

/// Seats actually released by an unlock
#[derive(Debug, Clone, Serialize)]
pub struct UnlockResponse {
    pub vehicle_id: Uuid,
    pub released: Vec<String>,
}
