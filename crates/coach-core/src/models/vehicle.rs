//! Vehicle instance model
//!
//! A scheduled run of a coach on a specific date. Its seats are generated once
//! from the layout at scheduling time and never resized.

use crate::models::seat::{Seat, SeatClass};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Share of seats, counted from the front, sold as premium
const PREMIUM_SHARE_PERCENT: i32 = 30;

/// Coach seating layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SeatLayout {
    /// Four seats per row
    #[default]
    #[serde(rename = "2+2")]
    TwoByTwo,
    /// Five seats per row
    #[serde(rename = "2+3")]
    TwoByThree,
}

impl fmt::Display for SeatLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatLayout::TwoByTwo => write!(f, "2+2"),
            SeatLayout::TwoByThree => write!(f, "2+3"),
        }
    }
}

impl SeatLayout {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "2+2" => Some(SeatLayout::TwoByTwo),
            "2+3" => Some(SeatLayout::TwoByThree),
            _ => None,
        }
    }

    pub fn seats_per_row(&self) -> i32 {
        match self {
            SeatLayout::TwoByTwo => 4,
            SeatLayout::TwoByThree => 5,
        }
    }

    /// Seat number for the 1-based position `index`: `1A`, `1B`, ... `2A`, ...
    pub fn seat_number(&self, index: i32) -> String {
        let (row, column) = self.position(index);
        let letter = char::from(b'A' + column as u8);
        format!("{}{}", row, letter)
    }

    /// (row, column) of the 1-based position `index`; rows start at 1, columns at 0
    pub fn position(&self, index: i32) -> (i32, i32) {
        let per_row = self.seats_per_row();
        ((index + per_row - 1) / per_row, (index - 1) % per_row)
    }
}

/// A scheduled run of a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInstance {
    pub id: Uuid,

    /// Registration or fleet number
    pub vehicle_number: String,

    pub operator_name: String,

    pub origin: String,

    pub destination: String,

    pub travel_date: NaiveDate,

    pub departs_at: DateTime<Utc>,

    pub arrives_at: DateTime<Utc>,

    /// Fare for seats without their own price
    pub base_price: Decimal,

    pub total_seats: i32,

    pub layout: SeatLayout,

    pub created_at: DateTime<Utc>,
}

impl VehicleInstance {
    /// Seats of this instance as they are created at scheduling time.
    ///
    /// The first 30% of positions are premium; they carry `premium_price` when given.
    pub fn seat_plan(&self, premium_price: Option<Decimal>) -> Vec<Seat> {
        let premium_count = self.total_seats * PREMIUM_SHARE_PERCENT / 100;

        (1..=self.total_seats)
            .map(|index| {
                let (row, column) = self.layout.position(index);
                let class = if index <= premium_count {
                    SeatClass::Premium
                } else {
                    SeatClass::Regular
                };

                let mut seat = Seat::new(self.id, self.layout.seat_number(index), class);
                seat.row = row;
                seat.column = column;
                if class == SeatClass::Premium {
                    seat.price = premium_price;
                }
                seat
            })
            .collect()
    }

    /// Route label, e.g. `Mumbai → Pune`
    pub fn route_label(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }
}
