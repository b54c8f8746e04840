//! In-memory seat ledger
//!
//! Seats are grouped per vehicle instance; each seat sits behind its own mutex.
//! The outer map is only write-locked when a vehicle's seats are created, so
//! guarded writes on distinct seats never contend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{
    models::{Seat, SeatGuard, SeatId, SeatState},
    traits::{CasOutcome, SeatLedger},
    AppError, AppResult,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Seats of one vehicle instance, kept in plan order
struct VehicleSeats {
    order: Vec<String>,
    seats: HashMap<String, Mutex<Seat>>,
}

/// Single-process seat ledger with per-seat atomicity
#[derive(Default)]
pub struct MemorySeatLedger {
    vehicles: RwLock<HashMap<Uuid, Arc<VehicleSeats>>>,
}

impl MemorySeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn vehicle(&self, vehicle_id: Uuid) -> Option<Arc<VehicleSeats>> {
        self.vehicles.read().get(&vehicle_id).cloned()
    }
}

#[async_trait]
impl SeatLedger for MemorySeatLedger {
    async fn get_seat(&self, id: &SeatId) -> AppResult<Option<Seat>> {
        Ok(self
            .vehicle(id.vehicle_id)
            .and_then(|v| v.seats.get(&id.seat_number).map(|s| s.lock().clone())))
    }

    #[instrument(skip(self))]
    async fn set_status(&self, id: &SeatId, state: SeatState) -> AppResult<Option<Seat>> {
        let Some(vehicle) = self.vehicle(id.vehicle_id) else {
            return Ok(None);
        };
        let Some(slot) = vehicle.seats.get(&id.seat_number) else {
            return Ok(None);
        };

        let mut seat = slot.lock();
        seat.state = state;
        Ok(Some(seat.clone()))
    }

    async fn compare_and_set(
        &self,
        id: &SeatId,
        guard: &SeatGuard,
        next: SeatState,
    ) -> AppResult<CasOutcome> {
        let Some(vehicle) = self.vehicle(id.vehicle_id) else {
            return Ok(CasOutcome::NotFound);
        };
        let Some(slot) = vehicle.seats.get(&id.seat_number) else {
            return Ok(CasOutcome::NotFound);
        };

        let mut seat = slot.lock();
        if guard.admits(&seat.state) {
            seat.state = next;
            Ok(CasOutcome::Applied(seat.clone()))
        } else {
            debug!("CAS on seat {} rejected, current status {}", id, seat.status());
            Ok(CasOutcome::Rejected(seat.clone()))
        }
    }

    async fn seats_for_vehicle(&self, vehicle_id: Uuid) -> AppResult<Vec<Seat>> {
        let Some(vehicle) = self.vehicle(vehicle_id) else {
            return Ok(Vec::new());
        };

        Ok(vehicle
            .order
            .iter()
            .filter_map(|number| vehicle.seats.get(number).map(|s| s.lock().clone()))
            .collect())
    }

    async fn expired_locks(&self, now: DateTime<Utc>) -> AppResult<Vec<Seat>> {
        let vehicles: Vec<Arc<VehicleSeats>> = self.vehicles.read().values().cloned().collect();

        Ok(vehicles
            .iter()
            .flat_map(|v| v.order.iter().filter_map(move |n| v.seats.get(n)))
            .filter_map(|slot| {
                let seat = slot.lock();
                seat.state.is_expired_at(now).then(|| seat.clone())
            })
            .collect())
    }

    #[instrument(skip(self, seats), fields(count = seats.len()))]
    async fn create_seats(&self, seats: &[Seat]) -> AppResult<usize> {
        let mut grouped: HashMap<Uuid, VehicleSeats> = HashMap::new();
        for seat in seats {
            let entry = grouped.entry(seat.vehicle_id).or_insert_with(|| VehicleSeats {
                order: Vec::new(),
                seats: HashMap::new(),
            });
            if entry.seats.contains_key(&seat.seat_number) {
                return Err(AppError::AlreadyExists(format!("Seat {}", seat.id())));
            }
            entry.order.push(seat.seat_number.clone());
            entry
                .seats
                .insert(seat.seat_number.clone(), Mutex::new(seat.clone()));
        }

        let mut vehicles = self.vehicles.write();
        if let Some(existing) = grouped.keys().find(|id| vehicles.contains_key(id)) {
            return Err(AppError::AlreadyExists(format!(
                "Seats for vehicle instance {}",
                existing
            )));
        }
        for (vehicle_id, group) in grouped {
            vehicles.insert(vehicle_id, Arc::new(group));
        }

        Ok(seats.len())
    }
}
