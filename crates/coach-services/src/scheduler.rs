//! Vehicle scheduling
//!
//! Creates a vehicle instance together with its seats. Seats are created once
//! here and never resized afterwards.

use crate::retry::{with_store_retry, RetryPolicy};
use chrono::{DateTime, Utc};
use coach_core::{
    models::{Seat, SeatLayout, VehicleInstance},
    traits::{SeatLedger, VehicleRepository},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

pub const MAX_SEATS_PER_VEHICLE: i32 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub vehicle_number: String,
    pub operator_name: String,
    pub origin: String,
    pub destination: String,
    pub departs_at: DateTime<Utc>,
    pub arrives_at: DateTime<Utc>,
    pub base_price: Decimal,
    #[serde(default)]
    pub premium_price: Option<Decimal>,
    pub total_seats: i32,
    #[serde(default)]
    pub layout: SeatLayout,
}

impl ScheduleRequest {
    fn validate(&self) -> AppResult<()> {
        if !(1..=MAX_SEATS_PER_VEHICLE).contains(&self.total_seats) {
            return Err(AppError::Validation(format!(
                "total_seats must be between 1 and {}",
                MAX_SEATS_PER_VEHICLE
            )));
        }
        if self.arrives_at <= self.departs_at {
            return Err(AppError::Validation(
                "arrival must be after departure".to_string(),
            ));
        }
        if self.base_price <= Decimal::ZERO {
            return Err(AppError::Validation("base_price must be positive".to_string()));
        }
        if matches!(self.premium_price, Some(p) if p <= Decimal::ZERO) {
            return Err(AppError::Validation(
                "premium_price must be positive".to_string(),
            ));
        }
        if self.origin.trim().eq_ignore_ascii_case(self.destination.trim()) {
            return Err(AppError::Validation(
                "origin and destination must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// A vehicle instance with its seat map
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledVehicle {
    pub vehicle: VehicleInstance,
    pub seats: Vec<Seat>,
}

pub struct VehicleScheduler {
    seats: Arc<dyn SeatLedger>,
    vehicles: Arc<dyn VehicleRepository>,
    retry: RetryPolicy,
}

impl VehicleScheduler {
    pub fn new(
        seats: Arc<dyn SeatLedger>,
        vehicles: Arc<dyn VehicleRepository>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            seats,
            vehicles,
            retry,
        }
    }

    /// Create a vehicle instance and all of its seats
    #[instrument(skip(self, request), fields(vehicle_number = %request.vehicle_number))]
    pub async fn schedule(&self, request: ScheduleRequest) -> AppResult<ScheduledVehicle> {
        request.validate()?;

        let vehicle = VehicleInstance {
            id: Uuid::new_v4(),
            vehicle_number: request.vehicle_number.trim().to_string(),
            operator_name: request.operator_name.trim().to_string(),
            origin: request.origin.trim().to_string(),
            destination: request.destination.trim().to_string(),
            travel_date: request.departs_at.date_naive(),
            departs_at: request.departs_at,
            arrives_at: request.arrives_at,
            base_price: request.base_price,
            total_seats: request.total_seats,
            layout: request.layout,
            created_at: Utc::now(),
        };
        let plan = vehicle.seat_plan(request.premium_price);

        let vehicle = with_store_retry(self.retry, "create vehicle", || {
            self.vehicles.create(&vehicle)
        })
        .await?;

        if let Err(e) = self.seats.create_seats(&plan).await {
            error!("Seats for {} not created, removing vehicle: {}", vehicle.id, e);
            if let Err(cleanup) = self.vehicles.delete(vehicle.id).await {
                error!("Vehicle {} left without seats: {}", vehicle.id, cleanup);
            }
            return Err(e);
        }

        info!(
            "Scheduled {} ({}) on {} with {} seats",
            vehicle.vehicle_number,
            vehicle.route_label(),
            vehicle.travel_date,
            plan.len()
        );

        Ok(ScheduledVehicle {
            vehicle,
            seats: plan,
        })
    }

    pub async fn get_vehicle(&self, vehicle_id: Uuid) -> AppResult<VehicleInstance> {
        with_store_retry(self.retry, "load vehicle", || self.vehicles.find_by_id(vehicle_id))
            .await?
            .ok_or_else(|| AppError::VehicleNotFound(vehicle_id.to_string()))
    }

    /// Current seat map, read straight from the ledger
    pub async fn seat_map(&self, vehicle_id: Uuid) -> AppResult<ScheduledVehicle> {
        let vehicle = self.get_vehicle(vehicle_id).await?;
        let seats = with_store_retry(self.retry, "load seat map", || {
            self.seats.seats_for_vehicle(vehicle_id)
        })
        .await?;

        Ok(ScheduledVehicle { vehicle, seats })
    }
}
