//! Coach Booking Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the seat reservation and booking engine. It includes:
//!
//! - Domain models (Seat, VehicleInstance, Booking, Payment, SeatEvent)
//! - The seat ledger and record store traits, plus payment and notification seams
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
