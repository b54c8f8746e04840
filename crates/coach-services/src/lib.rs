//! Booking services for the coach seat booking engine
//!
//! This crate holds the seat lock state machine and everything built on top of
//! it:
//!
//! - `LockManager` - acquire / release / confirm of single-seat holds
//! - `Reaper` - periodic release of expired holds
//! - `ReservationCoordinator` - all-or-nothing multi-seat reservation
//! - `BookingWorkflow` - reserve, charge, then confirm or compensate
//! - `CancellationEngine` - cancellation window, refund and seat release
//! - `SeatBroadcaster` - per-vehicle rooms for realtime seat events
//! - `VehicleScheduler`, `TravelReminders`, `AnalyticsService`
//!
//! # Architecture
//!
//! - Services hold their stores as trait objects and are shared behind `Arc`
//! - Seat state only changes through the lock manager's guarded writes
//! - Payment and notification calls never run while a seat is being written
//! - `BookingEngine` wires one instance of every service together

pub mod analytics;
pub mod booking_workflow;
pub mod broadcaster;
pub mod cancellation;
pub mod coordinator;
pub mod engine;
pub mod lock_manager;
pub mod notifier;
pub mod payment;
pub mod reaper;
pub mod reminders;
pub mod retry;
pub mod scheduler;

pub use analytics::{AnalyticsService, BookingAnalytics};
pub use booking_workflow::{BookingReceipt, BookingRequest, BookingWorkflow};
pub use broadcaster::{SeatBroadcaster, Subscription};
pub use cancellation::{CancellationEngine, CancellationOutcome};
pub use coordinator::{ReservationCoordinator, ReservationOutcome};
pub use engine::BookingEngine;
pub use lock_manager::{Lease, LockManager, LockOutcome};
pub use notifier::{BestEffortNotifier, LogNotifier};
pub use payment::MockPaymentGateway;
pub use reaper::Reaper;
pub use reminders::TravelReminders;
pub use retry::{with_store_retry, RetryPolicy};
pub use scheduler::{ScheduleRequest, ScheduledVehicle, VehicleScheduler};
