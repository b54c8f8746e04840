//! Domain models for the seat booking engine
//!
//! This module contains all the core domain models used throughout the application.

pub mod booking;
pub mod event;
pub mod seat;
pub mod user;
pub mod vehicle;

pub use booking::{Booking, BookingStatus, Gender, Passenger, Payment, PaymentKind, PaymentStatus};
pub use event::{NotificationKind, SeatEvent};
pub use seat::{Seat, SeatClass, SeatGuard, SeatId, SeatState, SeatStatus};
pub use user::UserRole;
pub use vehicle::{SeatLayout, VehicleInstance};
