//! Read-through cache for vehicle instances
//!
//! Vehicle instances never change after scheduling, so a cached copy can only
//! be missing, never stale. Cache failures fall through to the store.

use crate::keys::vehicle_key;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::{
    models::VehicleInstance,
    traits::{CacheService, Repository, VehicleRepository},
    AppResult,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Wraps a vehicle repository with a cache in front of `find_by_id`
pub struct CachedVehicleRepository<C> {
    inner: Arc<dyn VehicleRepository>,
    cache: C,
    ttl_secs: u64,
}

impl<C: CacheService> CachedVehicleRepository<C> {
    pub fn new(inner: Arc<dyn VehicleRepository>, cache: C, ttl_secs: u64) -> Self {
        Self {
            inner,
            cache,
            ttl_secs,
        }
    }

    async fn remember(&self, vehicle: &VehicleInstance) {
        if let Err(e) = self
            .cache
            .set(&vehicle_key(vehicle.id), vehicle, self.ttl_secs)
            .await
        {
            warn!("Failed to cache vehicle instance {}: {}", vehicle.id, e);
        }
    }
}

#[async_trait]
impl<C: CacheService> Repository<VehicleInstance, Uuid> for CachedVehicleRepository<C> {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<VehicleInstance>> {
        match self.cache.get::<VehicleInstance>(&vehicle_key(id)).await {
            Ok(Some(vehicle)) => return Ok(Some(vehicle)),
            Ok(None) => {}
            Err(e) => warn!("Vehicle cache read failed for {}: {}", id, e),
        }

        let found = self.inner.find_by_id(id).await?;
        if let Some(vehicle) = &found {
            debug!("Caching vehicle instance {}", id);
            self.remember(vehicle).await;
        }
        Ok(found)
    }

    async fn find_all(&self, limit: i64, offset: i64) -> AppResult<Vec<VehicleInstance>> {
        self.inner.find_all(limit, offset).await
    }

    async fn count(&self) -> AppResult<i64> {
        self.inner.count().await
    }

    async fn create(&self, entity: &VehicleInstance) -> AppResult<VehicleInstance> {
        let created = self.inner.create(entity).await?;
        self.remember(&created).await;
        Ok(created)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        if let Err(e) = self.cache.delete(&vehicle_key(id)).await {
            warn!("Failed to evict vehicle instance {}: {}", id, e);
        }
        self.inner.delete(id).await
    }
}

#[async_trait]
impl<C: CacheService> VehicleRepository for CachedVehicleRepository<C> {
    async fn list_departing_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<VehicleInstance>> {
        self.inner.list_departing_between(from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use coach_core::models::SeatLayout;
    use coach_core::AppError;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use serde::{de::DeserializeOwned, Serialize};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MapCache {
        entries: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CacheService for MapCache {
        async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
            match self.entries.lock().get(key) {
                Some(json) => Ok(Some(serde_json::from_str(json)?)),
                None => Ok(None),
            }
        }

        async fn set<T: Serialize + Send + Sync>(
            &self,
            key: &str,
            value: &T,
            _ttl_secs: u64,
        ) -> Result<(), AppError> {
            let json = serde_json::to_string(value)?;
            self.entries.lock().insert(key.to_string(), json);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, AppError> {
            Ok(self.entries.lock().remove(key).is_some())
        }

        async fn exists(&self, key: &str) -> Result<bool, AppError> {
            Ok(self.entries.lock().contains_key(key))
        }
    }

    struct CountingRepo {
        vehicle: VehicleInstance,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl Repository<VehicleInstance, Uuid> for CountingRepo {
        async fn find_by_id(&self, id: Uuid) -> AppResult<Option<VehicleInstance>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok((id == self.vehicle.id).then(|| self.vehicle.clone()))
        }

        async fn find_all(&self, _limit: i64, _offset: i64) -> AppResult<Vec<VehicleInstance>> {
            Ok(vec![self.vehicle.clone()])
        }

        async fn count(&self) -> AppResult<i64> {
            Ok(1)
        }

        async fn create(&self, entity: &VehicleInstance) -> AppResult<VehicleInstance> {
            Ok(entity.clone())
        }

        async fn delete(&self, _id: Uuid) -> AppResult<bool> {
            Ok(true)
        }
    }

    #[async_trait]
    impl VehicleRepository for CountingRepo {
        async fn list_departing_between(
            &self,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> AppResult<Vec<VehicleInstance>> {
            Ok(vec![])
        }
    }

    fn vehicle() -> VehicleInstance {
        let departs_at = Utc.with_ymd_and_hms(2025, 1, 10, 21, 0, 0).unwrap();
        VehicleInstance {
            id: Uuid::new_v4(),
            vehicle_number: "MH12AB1234".to_string(),
            operator_name: "Konkan Travels".to_string(),
            origin: "Mumbai".to_string(),
            destination: "Pune".to_string(),
            travel_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            departs_at,
            arrives_at: departs_at + chrono::Duration::hours(4),
            base_price: dec!(400),
            total_seats: 40,
            layout: SeatLayout::TwoByTwo,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_read_through() {
        let v = vehicle();
        let inner = Arc::new(CountingRepo {
            vehicle: v.clone(),
            lookups: AtomicUsize::new(0),
        });
        let repo = CachedVehicleRepository::new(inner.clone(), MapCache::default(), 300);

        assert_eq!(repo.find_by_id(v.id).await.unwrap(), Some(v.clone()));
        assert_eq!(repo.find_by_id(v.id).await.unwrap(), Some(v.clone()));
        assert_eq!(inner.lookups.load(Ordering::SeqCst), 1);

        assert_eq!(repo.find_by_id(Uuid::new_v4()).await.unwrap(), None);
        assert_eq!(inner.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delete_evicts() {
        let v = vehicle();
        let inner = Arc::new(CountingRepo {
            vehicle: v.clone(),
            lookups: AtomicUsize::new(0),
        });
        let repo = CachedVehicleRepository::new(inner.clone(), MapCache::default(), 300);

        repo.find_by_id(v.id).await.unwrap();
        assert!(repo.cache.exists(&vehicle_key(v.id)).await.unwrap());

        repo.delete(v.id).await.unwrap();
        assert!(!repo.cache.exists(&vehicle_key(v.id)).await.unwrap());
    }
}
