//! Coach Booking Storage Layer
//!
//! This crate provides the storage backends behind the seat ledger and record
//! store traits of coach-core:
//!
//! - PostgreSQL (sqlx) with single-statement guarded seat updates
//! - An in-memory backend with a mutex per seat
//! - A stub that rejects every operation, for tests
//!
//! The backend is chosen once at startup and handed around as a [`Stores`] bundle.

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod stub;

pub use memory::{
    MemoryBookingRepository, MemoryPaymentRepository, MemorySeatLedger, MemoryVehicleRepository,
};
pub use pool::connect;
pub use repositories::*;
pub use stub::StubStore;

// Re-export commonly used types
pub use coach_core::{AppError, AppResult};
pub use sqlx::PgPool;

use coach_core::config::{AppConfig, StorageBackend};
use coach_core::traits::{BookingRepository, PaymentRepository, SeatLedger, VehicleRepository};
use std::sync::Arc;
use tracing::info;

/// The stores one engine instance runs against
#[derive(Clone)]
pub struct Stores {
    pub seats: Arc<dyn SeatLedger>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
}

impl Stores {
    /// Fresh in-memory stores
    pub fn memory() -> Self {
        Self {
            seats: Arc::new(MemorySeatLedger::new()),
            vehicles: Arc::new(MemoryVehicleRepository::new()),
            bookings: Arc::new(MemoryBookingRepository::new()),
            payments: Arc::new(MemoryPaymentRepository::new()),
        }
    }

    /// PostgreSQL-backed stores sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            seats: Arc::new(PgSeatLedger::new(pool.clone())),
            vehicles: Arc::new(PgVehicleRepository::new(pool.clone())),
            bookings: Arc::new(PgBookingRepository::new(pool.clone())),
            payments: Arc::new(PgPaymentRepository::new(pool)),
        }
    }

    /// Stores that fail every call with `NotImplemented`
    pub fn stub() -> Self {
        Self {
            seats: Arc::new(StubStore),
            vehicles: Arc::new(StubStore),
            bookings: Arc::new(StubStore),
            payments: Arc::new(StubStore),
        }
    }

    /// Replace the vehicle repository (e.g. with a caching wrapper)
    pub fn with_vehicles(mut self, vehicles: Arc<dyn VehicleRepository>) -> Self {
        self.vehicles = vehicles;
        self
    }

    /// Open the backend selected by `storage.backend`
    pub async fn open(config: &AppConfig) -> AppResult<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage backend");
                Ok(Self::memory())
            }
            StorageBackend::Postgres => {
                let pool = connect(&config.database).await?;
                info!("Using PostgreSQL storage backend");
                Ok(Self::postgres(pool))
            }
        }
    }
}
