//! In-memory backend for single-process deployments and tests

pub mod records;
pub mod seat_ledger;

pub use records::{MemoryBookingRepository, MemoryPaymentRepository, MemoryVehicleRepository};
pub use seat_ledger::MemorySeatLedger;
