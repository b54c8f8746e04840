//! Vehicle handlers
//!
//! Scheduling of vehicle instances and the seat map.

use crate::dto::{
    ApiResponse, ScheduleVehicleRequest, ScheduledVehicleResponse, SeatMapResponse, SeatView,
    VehicleResponse,
};
use actix_web::{web, HttpResponse};
use coach_auth::{AdminUser, AuthenticatedUser};
use coach_core::AppError;
use coach_services::BookingEngine;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Schedule a vehicle instance and create its seats
///
/// POST /api/v1/vehicles
#[instrument(skip(engine, admin, req), fields(admin = %admin.user_id))]
pub async fn schedule_vehicle(
    engine: web::Data<Arc<BookingEngine>>,
    admin: AdminUser,
    req: web::Json<ScheduleVehicleRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Vehicle scheduling validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let scheduled = engine.scheduler.schedule(req.into_inner().into()).await?;

    info!(
        vehicle_id = %scheduled.vehicle.id,
        seats = scheduled.seats.len(),
        "Vehicle scheduled"
    );

    let base_price = scheduled.vehicle.base_price;
    let seats = scheduled
        .seats
        .iter()
        .map(|s| SeatView::new(s, base_price, &admin.user_id))
        .collect();
    let response = ScheduledVehicleResponse {
        vehicle: scheduled.vehicle.into(),
        seats,
    };

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        response,
        "Vehicle scheduled successfully",
    )))
}

/// Get a vehicle instance
///
/// GET /api/v1/vehicles/{id}
#[instrument(skip(engine, _user))]
pub async fn get_vehicle(
    engine: web::Data<Arc<BookingEngine>>,
    path: web::Path<Uuid>,
    _user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let vehicle = engine.scheduler.get_vehicle(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(VehicleResponse::from(vehicle))))
}

/// Current seat map, straight from the ledger
///
/// GET /api/v1/vehicles/{id}/seats
#[instrument(skip(engine, user))]
pub async fn get_seat_map(
    engine: web::Data<Arc<BookingEngine>>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let vehicle_id = path.into_inner();
    debug!(%vehicle_id, "Fetching seat map");

    let map = engine.scheduler.seat_map(vehicle_id).await?;
    let response = SeatMapResponse::new(&map.vehicle, &map.seats, &user.user_id);

    Ok(HttpResponse::Ok().json(ApiResponse::success(response)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/vehicles")
            .route("", web::post().to(schedule_vehicle))
            .route("/{id}", web::get().to(get_vehicle))
            .route("/{id}/seats", web::get().to(get_seat_map))
            .route(
                "/{id}/reservations",
                web::post().to(super::reservation::reserve_seats),
            )
            .route(
                "/{id}/reservations",
                web::delete().to(super::reservation::unlock_seats),
            ),
    );
}
