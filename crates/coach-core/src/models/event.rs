//! Realtime seat events and notification kinds

use crate::models::seat::SeatStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Seat transition fanned out to everyone viewing a vehicle's seat map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatEvent {
    SeatLocked { vehicle_id: Uuid, seat_number: String },
    SeatUnlocked { vehicle_id: Uuid, seat_number: String },
    SeatBooked { vehicle_id: Uuid, seat_number: String },
}

impl SeatEvent {
    pub fn locked(vehicle_id: Uuid, seat_number: impl Into<String>) -> Self {
        SeatEvent::SeatLocked {
            vehicle_id,
            seat_number: seat_number.into(),
        }
    }

    pub fn unlocked(vehicle_id: Uuid, seat_number: impl Into<String>) -> Self {
        SeatEvent::SeatUnlocked {
            vehicle_id,
            seat_number: seat_number.into(),
        }
    }

    pub fn booked(vehicle_id: Uuid, seat_number: impl Into<String>) -> Self {
        SeatEvent::SeatBooked {
            vehicle_id,
            seat_number: seat_number.into(),
        }
    }

    pub fn seat_number(&self) -> &str {
        match self {
            SeatEvent::SeatLocked { seat_number, .. }
            | SeatEvent::SeatUnlocked { seat_number, .. }
            | SeatEvent::SeatBooked { seat_number, .. } => seat_number,
        }
    }

    /// Seat status a viewer should show after this event
    pub fn resulting_status(&self) -> SeatStatus {
        match self {
            SeatEvent::SeatLocked { .. } => SeatStatus::Locked,
            SeatEvent::SeatUnlocked { .. } => SeatStatus::Available,
            SeatEvent::SeatBooked { .. } => SeatStatus::Booked,
        }
    }
}

/// Outbound notification kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmed,
    BookingCancelled,
    TravelReminder,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::BookingConfirmed => write!(f, "booking_confirmed"),
            NotificationKind::BookingCancelled => write!(f, "booking_cancelled"),
            NotificationKind::TravelReminder => write!(f, "travel_reminder"),
        }
    }
}
