//! HTTP request handlers

pub mod admin;
pub mod auth;
pub mod booking;
pub mod health;
pub mod reservation;
pub mod vehicle;
pub mod ws;

pub use admin::configure as configure_admin;
pub use auth::configure as configure_auth;
pub use booking::configure as configure_bookings;
pub use health::configure as configure_health;
pub use vehicle::configure as configure_vehicles;
pub use ws::configure as configure_ws;
