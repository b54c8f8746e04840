//! Cache key builders
//!
//! # Key Patterns
//!
//! - `{namespace}:vehicle:{vehicle_id}` - Scheduled vehicle instance
//!
//! Seat state is never cached; every seat read goes to the ledger.

use uuid::Uuid;

/// Default namespace in front of every key
pub const NAMESPACE: &str = "coach";

/// Prefix for cached vehicle instances
pub const VEHICLE_PREFIX: &str = "vehicle";

/// Build a cache key for a vehicle instance
///
/// # Example
///
/// ```
/// use coach_cache::keys::vehicle_key;
/// use uuid::Uuid;
///
/// let id = Uuid::nil();
/// assert_eq!(vehicle_key(id), "vehicle:00000000-0000-0000-0000-000000000000");
/// ```
pub fn vehicle_key(vehicle_id: Uuid) -> String {
    format!("{}:{}", VEHICLE_PREFIX, vehicle_id)
}
