//! Admin handlers
//!
//! Booking desk views across all callers.

use crate::dto::{ApiResponse, BookingResponse, PaginationParams};
use actix_web::{web, HttpResponse};
use coach_auth::AdminUser;
use coach_core::traits::Repository;
use coach_core::AppError;
use coach_services::BookingEngine;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use validator::Validate;

/// Booking totals, revenue and monthly buckets
///
/// GET /api/v1/admin/analytics
#[instrument(skip(engine, _admin))]
pub async fn get_analytics(
    engine: web::Data<Arc<BookingEngine>>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    debug!("Computing booking analytics");
    let report = engine.analytics.booking_analytics().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(report)))
}

/// Every booking, newest first
///
/// GET /api/v1/admin/bookings
#[instrument(skip(engine, _admin))]
pub async fn list_all_bookings(
    engine: web::Data<Arc<BookingEngine>>,
    query: web::Query<PaginationParams>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let bookings = engine
        .stores
        .bookings
        .find_all(query.limit(), query.offset())
        .await?;
    let total = engine.stores.bookings.count().await?;

    let data: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/analytics", web::get().to(get_analytics))
            .route("/bookings", web::get().to(list_all_bookings)),
    );
}
