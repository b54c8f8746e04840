//! API layer for the coach seat booking engine
//!
//! HTTP handlers for scheduling, seat reservation, booking and cancellation,
//! plus the WebSocket endpoint streaming seat transitions per vehicle.
//!
//! Handlers expect the following app data:
//!
//! - `web::Data<Arc<BookingEngine>>`
//! - `web::Data<Arc<JwtService>>` (read by the auth extractors)
//! - `web::Data<AuthConfig>` (development token switch)
//! - `web::Data<Throttles>` (per-caller limits on seat locks, bookings and tokens)

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod dto;
pub mod handlers;
pub mod security;

use actix_web::web;

pub use dto::{ApiResponse, PaginationParams};
pub use security::{security_headers, Throttle, Throttles};
pub use handlers::{
    configure_admin, configure_auth, configure_bookings, configure_health, configure_vehicles,
    configure_ws,
};

/// Every REST route; mount under `/api/v1`
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.configure(configure_health)
        .configure(configure_auth)
        .configure(configure_vehicles)
        .configure(configure_bookings)
        .configure(configure_admin);
}
