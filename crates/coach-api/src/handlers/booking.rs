//! Booking handlers
//!
//! Checkout, the caller's booking history, payment records and cancellation.

use crate::dto::{
    ApiResponse, BookingReceiptResponse, BookingResponse, CancelBookingRequest,
    CancellationResponse, CreateBookingRequest, PaginationParams, PaymentResponse,
};
use crate::security::Throttles;
use actix_web::{web, HttpResponse};
use coach_auth::AuthenticatedUser;
use coach_core::models::Booking;
use coach_core::traits::{BookingRepository, PaymentRepository, Repository};
use coach_core::AppError;
use coach_services::BookingEngine;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Load a booking the caller may see
async fn load_visible(
    engine: &BookingEngine,
    id: Uuid,
    user: &AuthenticatedUser,
) -> Result<Booking, AppError> {
    let booking = engine
        .stores
        .bookings
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::BookingNotFound(id.to_string()))?;

    if !user.can_access(&booking.user_id) {
        warn!(
            caller = %user.user_id,
            booking = %booking.booking_number,
            "Booking access denied"
        );
        return Err(AppError::Forbidden);
    }

    Ok(booking)
}

/// Reserve, pay for and confirm seats in one call
///
/// POST /api/v1/bookings
#[instrument(skip(engine, throttles, user, req), fields(caller = %user.user_id))]
pub async fn create_booking(
    engine: web::Data<Arc<BookingEngine>>,
    throttles: web::Data<Throttles>,
    user: AuthenticatedUser,
    req: web::Json<CreateBookingRequest>,
) -> Result<HttpResponse, AppError> {
    throttles.bookings.check(&user.user_id)?;

    req.validate().map_err(|e| {
        warn!("Booking validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let receipt = engine
        .confirm_booking(&user.user_id, req.into_inner().into())
        .await?;

    info!(
        booking = %receipt.booking.booking_number,
        total = %receipt.booking.total_amount,
        "Booking created"
    );

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        BookingReceiptResponse::from(receipt),
        "Booking confirmed",
    )))
}

/// Bookings of the caller, newest first
///
/// GET /api/v1/bookings
#[instrument(skip(engine, user), fields(caller = %user.user_id))]
pub async fn list_bookings(
    engine: web::Data<Arc<BookingEngine>>,
    query: web::Query<PaginationParams>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    debug!(page = query.page, per_page = query.per_page, "Listing bookings");

    let bookings = engine
        .stores
        .bookings
        .list_by_user(&user.user_id, query.limit(), query.offset())
        .await?;
    let total = engine.stores.bookings.count_by_user(&user.user_id).await?;

    let data: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(data, total)))
}

/// GET /api/v1/bookings/{id}
#[instrument(skip(engine, user))]
pub async fn get_booking(
    engine: web::Data<Arc<BookingEngine>>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let booking = load_visible(&engine, path.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(BookingResponse::from(booking))))
}

/// Charge and refund attempts of a booking
///
/// GET /api/v1/bookings/{id}/payments
#[instrument(skip(engine, user))]
pub async fn get_booking_payments(
    engine: web::Data<Arc<BookingEngine>>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let booking = load_visible(&engine, path.into_inner(), &user).await?;
    let payments: Vec<PaymentResponse> = engine
        .stores
        .payments
        .list_by_booking(booking.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(payments)))
}

/// Cancel a confirmed booking and refund it
///
/// POST /api/v1/bookings/{id}/cancel
#[instrument(skip(engine, user, req), fields(caller = %user.user_id))]
pub async fn cancel_booking(
    engine: web::Data<Arc<BookingEngine>>,
    path: web::Path<Uuid>,
    user: AuthenticatedUser,
    req: Option<web::Json<CancelBookingRequest>>,
) -> Result<HttpResponse, AppError> {
    let req = req.map(web::Json::into_inner).unwrap_or_default();
    req.validate().map_err(|e| {
        warn!("Cancellation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let outcome = engine
        .cancel_booking(path.into_inner(), &user.user_id, req.reason)
        .await?;

    let message = if outcome.refund_settled {
        "Booking cancelled and refunded"
    } else {
        "Booking cancelled; refund pending"
    };

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        CancellationResponse::from(outcome),
        message,
    )))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookings")
            .route("", web::post().to(create_booking))
            .route("", web::get().to(list_bookings))
            .route("/{id}", web::get().to(get_booking))
            .route("/{id}/payments", web::get().to(get_booking_payments))
            .route("/{id}/cancel", web::post().to(cancel_booking)),
    );
}
