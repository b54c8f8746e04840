//! Unified error handling for the seat booking engine
//!
//! This module provides a single error type covering every failure class of the
//! reservation and booking flows, with automatic HTTP response mapping.

use actix_web::{
    http::{header, StatusCode},
    HttpResponse, ResponseError,
};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    // ==================== Storage Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Store temporarily unavailable: {0}")]
    StoreUnavailable(String),

    // ==================== Cache Errors ====================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    #[error("Too many attempts, retry in {retry_after_secs}s")]
    TooManyAttempts { retry_after_secs: u64 },

    // ==================== Inventory Errors ====================
    #[error("Seat not found: {0}")]
    SeatNotFound(String),

    #[error("Vehicle instance not found: {0}")]
    VehicleNotFound(String),

    #[error("Seats unavailable: {}", .0.join(", "))]
    SeatsUnavailable(Vec<String>),

    #[error("Seat {0} is not held by this caller")]
    SeatNotHeld(String),

    // ==================== Booking Errors ====================
    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    #[error("Invalid booking state: {0}")]
    InvalidBookingState(String),

    #[error("Cancellation window expired: departure in {hours_remaining}h, cutoff is {cutoff_hours}h")]
    CancellationWindowExpired {
        hours_remaining: i64,
        cutoff_hours: i64,
    },

    #[error("No seats selected")]
    EmptySeatSelection,

    // ==================== Payment Errors ====================
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::EmptySeatSelection => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::InvalidToken(_) | AppError::TokenExpired | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }

            // 402 Payment Required
            AppError::PaymentDeclined(_) => StatusCode::PAYMENT_REQUIRED,

            // 403 Forbidden
            AppError::Forbidden => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::SeatNotFound(_)
            | AppError::VehicleNotFound(_)
            | AppError::BookingNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::SeatsUnavailable(_)
            | AppError::SeatNotHeld(_)
            | AppError::InvalidBookingState(_)
            | AppError::AlreadyExists(_) => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            AppError::CancellationWindowExpired { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 429 Too Many Requests
            AppError::TooManyAttempts { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 501 Not Implemented
            AppError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,

            // 503 Service Unavailable
            AppError::StoreUnavailable(_) | AppError::Pool(_) => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::TooManyAttempts { .. } => "too_many_attempts",
            AppError::SeatNotFound(_) => "seat_not_found",
            AppError::VehicleNotFound(_) => "vehicle_not_found",
            AppError::SeatsUnavailable(_) => "seats_unavailable",
            AppError::SeatNotHeld(_) => "seat_not_held",
            AppError::BookingNotFound(_) => "booking_not_found",
            AppError::InvalidBookingState(_) => "invalid_booking_state",
            AppError::CancellationWindowExpired { .. } => "cancellation_window_expired",
            AppError::EmptySeatSelection => "empty_seat_selection",
            AppError::PaymentDeclined(_) => "payment_declined",
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::NotImplemented(_) => "not_implemented",
        }
    }

    /// Whether a local retry with backoff may succeed.
    ///
    /// Only store outages qualify; everything else is reported immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_) | AppError::Pool(_))
    }

    /// Whether the client may reasonably retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        self.is_transient()
            || matches!(
                self,
                AppError::PaymentDeclined(_) | AppError::TooManyAttempts { .. }
            )
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let mut body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        });

        if let AppError::SeatsUnavailable(seats) = self {
            body["details"] = json!({ "unavailable_seats": seats });
        }

        let mut response = HttpResponse::build(status);
        if let AppError::TooManyAttempts { retry_after_secs } = self {
            response.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }
        response.json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::StoreUnavailable(err.to_string())
            }
            sqlx::Error::RowNotFound => AppError::NotFound(err.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}
