//! Reservation handlers
//!
//! Temporary seat holds taken before checkout. A hold lasts the configured lock
//! TTL and is either confirmed by a booking, released explicitly, or reaped.

use crate::dto::{ApiResponse, ReservationResponse, SeatSelectionRequest, UnlockResponse};
use crate::security::Throttles;
use actix_web::{web, HttpResponse};
use coach_auth::AuthenticatedUser;
use coach_core::AppError;
use coach_services::{BookingEngine, ReservationOutcome};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Lock a set of seats for the caller, all or nothing
///
/// POST /api/v1/vehicles/{id}/reservations
#[instrument(skip(engine, throttles, user, req), fields(caller = %user.user_id))]
pub async fn reserve_seats(
    engine: web::Data<Arc<BookingEngine>>,
    throttles: web::Data<Throttles>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    req: web::Json<SeatSelectionRequest>,
) -> Result<HttpResponse, AppError> {
    throttles.reservations.check(&user.user_id)?;

    req.validate().map_err(|e| {
        warn!("Reservation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let vehicle_id = path.into_inner();
    match engine
        .reserve_seats(vehicle_id, &req.seat_numbers, &user.user_id)
        .await?
    {
        ReservationOutcome::Reserved(seats) => {
            info!(%vehicle_id, seats = seats.len(), "Seats reserved");
            Ok(HttpResponse::Ok().json(ApiResponse::with_message(
                ReservationResponse::new(vehicle_id, &seats),
                "Seats reserved",
            )))
        }
        ReservationOutcome::PartiallyUnavailable(unavailable) => {
            Err(AppError::SeatsUnavailable(unavailable))
        }
    }
}

/// Release seats the caller holds; seats not held by the caller are ignored
///
/// DELETE /api/v1/vehicles/{id}/reservations
#[instrument(skip(engine, user, req), fields(caller = %user.user_id))]
pub async fn unlock_seats(
    engine: web::Data<Arc<BookingEngine>>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    req: web::Json<SeatSelectionRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Unlock validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let vehicle_id = path.into_inner();
    let released = engine
        .unlock_seats(vehicle_id, &req.seat_numbers, &user.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(UnlockResponse {
        vehicle_id,
        released,
    })))
}
