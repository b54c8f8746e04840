//! Seat model
//!
//! A seat's status, lock holder and lock expiry are carried by a single
//! [`SeatState`] value, so a locked seat always has both a holder and an
//! expiry and an available or booked seat never has either.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Flat seat status as stored and shown on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    #[default]
    Available,
    Locked,
    Booked,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatStatus::Available => write!(f, "available"),
            SeatStatus::Locked => write!(f, "locked"),
            SeatStatus::Booked => write!(f, "booked"),
        }
    }
}

impl SeatStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(SeatStatus::Available),
            "locked" => Some(SeatStatus::Locked),
            "booked" => Some(SeatStatus::Booked),
            _ => None,
        }
    }
}

/// Seat lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeatState {
    #[default]
    Available,
    Locked {
        #[serde(rename = "locked_by")]
        holder: String,
        #[serde(rename = "locked_until")]
        expires_at: DateTime<Utc>,
    },
    Booked,
}

impl SeatState {
    pub fn locked(holder: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        SeatState::Locked {
            holder: holder.into(),
            expires_at,
        }
    }

    pub fn status(&self) -> SeatStatus {
        match self {
            SeatState::Available => SeatStatus::Available,
            SeatState::Locked { .. } => SeatStatus::Locked,
            SeatState::Booked => SeatStatus::Booked,
        }
    }

    pub fn holder(&self) -> Option<&str> {
        match self {
            SeatState::Locked { holder, .. } => Some(holder),
            _ => None,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            SeatState::Locked { expires_at, .. } => Some(*expires_at),
            _ => None,
        }
    }

    /// Locked by `holder`, regardless of expiry
    pub fn is_held_by(&self, holder: &str) -> bool {
        self.holder() == Some(holder)
    }

    /// Locked by `holder` and the hold has not run out at `now`
    pub fn is_held_by_at(&self, holder: &str, now: DateTime<Utc>) -> bool {
        matches!(self, SeatState::Locked { holder: h, expires_at } if h == holder && *expires_at > now)
    }

    /// Exactly the lock `holder` was granted until `expires_at`
    pub fn is_lease(&self, holder: &str, expires_at: DateTime<Utc>) -> bool {
        matches!(self, SeatState::Locked { holder: h, expires_at: e } if h == holder && *e == expires_at)
    }

    /// Locked and the hold ran out at or before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self, SeatState::Locked { expires_at, .. } if *expires_at <= now)
    }

    /// Rebuild a state from its stored columns.
    ///
    /// Returns `None` when the columns violate the locked/holder/expiry invariant.
    pub fn from_parts(
        status: SeatStatus,
        holder: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        match (status, holder, expires_at) {
            (SeatStatus::Available, None, None) => Some(SeatState::Available),
            (SeatStatus::Booked, None, None) => Some(SeatState::Booked),
            (SeatStatus::Locked, Some(holder), Some(expires_at)) => {
                Some(SeatState::Locked { holder, expires_at })
            }
            _ => None,
        }
    }
}

/// Precondition checked atomically with a seat state write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeatGuard {
    /// Seat is available
    Available,
    /// Seat is locked by this holder, expired or not
    HeldBy(String),
    /// Seat still carries this exact lock, expired or not
    Lease {
        holder: String,
        expires_at: DateTime<Utc>,
    },
    /// Seat still carries this exact lock and it has not run out at `now`
    LiveLease {
        holder: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },
    /// Seat is locked and the lock ran out at or before this instant
    ExpiredAt(DateTime<Utc>),
    /// Seat is booked
    Booked,
}

impl SeatGuard {
    /// Whether `state` satisfies this guard
    pub fn admits(&self, state: &SeatState) -> bool {
        match self {
            SeatGuard::Available => matches!(state, SeatState::Available),
            SeatGuard::HeldBy(holder) => state.is_held_by(holder),
            SeatGuard::Lease { holder, expires_at } => state.is_lease(holder, *expires_at),
            SeatGuard::LiveLease {
                holder,
                expires_at,
                now,
            } => state.is_lease(holder, *expires_at) && *expires_at > *now,
            SeatGuard::ExpiredAt(now) => state.is_expired_at(*now),
            SeatGuard::Booked => matches!(state, SeatState::Booked),
        }
    }
}

/// Fare class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SeatClass {
    Premium,
    #[default]
    Regular,
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatClass::Premium => write!(f, "premium"),
            SeatClass::Regular => write!(f, "regular"),
        }
    }
}

impl SeatClass {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "premium" => Some(SeatClass::Premium),
            "regular" => Some(SeatClass::Regular),
            _ => None,
        }
    }
}

/// Identity of a seat: the vehicle instance it belongs to and its number.
///
/// Ordered by vehicle, then row, then the seat letter, so `2A` sorts before `10A`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatId {
    pub vehicle_id: Uuid,
    pub seat_number: String,
}

impl SeatId {
    pub fn new(vehicle_id: Uuid, seat_number: impl Into<String>) -> Self {
        Self {
            vehicle_id,
            seat_number: seat_number.into(),
        }
    }

    fn sort_key(&self) -> (u32, &str) {
        let digits = self
            .seat_number
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.seat_number.len());
        let row = self.seat_number[..digits].parse().unwrap_or(u32::MAX);
        (row, &self.seat_number[digits..])
    }
}

impl Ord for SeatId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.vehicle_id
            .cmp(&other.vehicle_id)
            .then_with(|| self.sort_key().cmp(&other.sort_key()))
            .then_with(|| self.seat_number.cmp(&other.seat_number))
    }
}

impl PartialOrd for SeatId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.vehicle_id, self.seat_number)
    }
}

/// A numbered seat on a scheduled vehicle instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub vehicle_id: Uuid,

    pub seat_number: String,

    #[serde(flatten)]
    pub state: SeatState,

    pub seat_class: SeatClass,

    /// Per-seat fare; the vehicle's base price applies when unset
    pub price: Option<Decimal>,

    pub row: i32,

    pub column: i32,
}

impl Seat {
    pub fn new(vehicle_id: Uuid, seat_number: impl Into<String>, seat_class: SeatClass) -> Self {
        Self {
            vehicle_id,
            seat_number: seat_number.into(),
            state: SeatState::Available,
            seat_class,
            price: None,
            row: 0,
            column: 0,
        }
    }

    pub fn id(&self) -> SeatId {
        SeatId::new(self.vehicle_id, self.seat_number.clone())
    }

    pub fn status(&self) -> SeatStatus {
        self.state.status()
    }

    /// Fare for this seat given the vehicle's base price
    pub fn fare(&self, base_price: Decimal) -> Decimal {
        self.price.unwrap_or(base_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_state_accessors() {
        let now = Utc::now();
        let state = SeatState::locked("alice", now + Duration::minutes(10));

        assert_eq!(state.status(), SeatStatus::Locked);
        assert!(state.is_held_by("alice"));
        assert!(!state.is_held_by("bob"));
        assert!(state.is_held_by_at("alice", now));
        assert!(!state.is_held_by_at("alice", now + Duration::minutes(11)));
        assert!(state.is_expired_at(now + Duration::minutes(10)));
        assert_eq!(SeatState::Booked.holder(), None);
    }

    #[test]
    fn test_from_parts_rejects_inconsistent_rows() {
        let now = Utc::now();
        assert_eq!(
            SeatState::from_parts(SeatStatus::Locked, Some("x".into()), Some(now)),
            Some(SeatState::locked("x", now))
        );
        assert_eq!(SeatState::from_parts(SeatStatus::Locked, None, Some(now)), None);
        assert_eq!(
            SeatState::from_parts(SeatStatus::Available, Some("x".into()), None),
            None
        );
    }

    #[test]
    fn test_guard_admits() {
        let now = Utc::now();
        let held = SeatState::locked("alice", now + Duration::seconds(5));
        let stale = SeatState::locked("alice", now - Duration::seconds(5));

        assert!(SeatGuard::Available.admits(&SeatState::Available));
        assert!(!SeatGuard::Available.admits(&held));
        assert!(SeatGuard::HeldBy("alice".into()).admits(&stale));
        assert!(!SeatGuard::LiveLease {
            holder: "alice".into(),
            expires_at: now - Duration::seconds(5),
            now
        }
        .admits(&stale));
        assert!(SeatGuard::ExpiredAt(now).admits(&stale));
        assert!(!SeatGuard::ExpiredAt(now).admits(&held));
        assert!(SeatGuard::Booked.admits(&SeatState::Booked));
    }

    #[test]
    fn test_lease_guard_rejects_a_newer_lock_of_the_same_holder() {
        let now = Utc::now();
        let first = now + Duration::seconds(5);
        let relocked = SeatState::locked("alice", now + Duration::seconds(9));

        let lease = SeatGuard::LiveLease {
            holder: "alice".into(),
            expires_at: first,
            now,
        };
        assert!(lease.admits(&SeatState::locked("alice", first)));
        assert!(!lease.admits(&relocked));
        assert!(!SeatGuard::Lease {
            holder: "alice".into(),
            expires_at: first
        }
        .admits(&relocked));
        assert!(SeatGuard::HeldBy("alice".into()).admits(&relocked));
    }

    #[test]
    fn test_seat_id_natural_order() {
        let v = Uuid::new_v4();
        let mut ids = vec![
            SeatId::new(v, "10A"),
            SeatId::new(v, "2B"),
            SeatId::new(v, "2A"),
            SeatId::new(v, "1D"),
        ];
        ids.sort();
        let numbers: Vec<_> = ids.iter().map(|s| s.seat_number.as_str()).collect();
        assert_eq!(numbers, vec!["1D", "2A", "2B", "10A"]);
    }

    #[test]
    fn test_seat_serialization_flattens_state() {
        let mut seat = Seat::new(Uuid::nil(), "1A", SeatClass::Premium);
        seat.price = Some(dec!(450));
        let json = serde_json::to_value(&seat).unwrap();
        assert_eq!(json["status"], "available");
        assert_eq!(json["seat_class"], "premium");

        seat.state = SeatState::locked("alice", Utc::now());
        let json = serde_json::to_value(&seat).unwrap();
        assert_eq!(json["status"], "locked");
        assert_eq!(json["locked_by"], "alice");
    }

    #[test]
    fn test_fare_fallback() {
        let mut seat = Seat::new(Uuid::nil(), "3C", SeatClass::Regular);
        assert_eq!(seat.fare(dec!(400)), dec!(400));
        seat.price = Some(dec!(520));
        assert_eq!(seat.fare(dec!(400)), dec!(520));
    }
}
