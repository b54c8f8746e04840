//! Data Transfer Objects (DTOs) for API requests and responses

pub mod auth;
pub mod booking;
pub mod common;
pub mod reservation;
pub mod vehicle;

pub use auth::*;
pub use booking::*;
pub use common::*;
pub use reservation::*;
pub use vehicle::*;
