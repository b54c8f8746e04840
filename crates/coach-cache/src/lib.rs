//! Redis caching for the coach booking engine
//!
//! Only scheduled vehicle instances are cached. Seat state is never served
//! from here; the seat ledger stays the single source of availability.

pub mod keys;
pub mod vehicles;

pub use vehicles::CachedVehicleRepository;

use async_trait::async_trait;
use coach_core::error::AppError;
use coach_core::traits::CacheService;
use redis::{aio::ConnectionManager, AsyncCommands, Client, ErrorKind, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info};

/// Redis-backed `CacheService`
///
/// Every key is written under `namespace`, so several deployments can share
/// one Redis database.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
    namespace: String,
}

impl RedisCache {
    /// Connect and round-trip a PING before handing the cache out
    pub async fn new(url: &str) -> Result<Self, AppError> {
        Self::with_namespace(url, keys::NAMESPACE).await
    }

    pub async fn with_namespace(url: &str, namespace: &str) -> Result<Self, AppError> {
        let client = Client::open(url)
            .map_err(|e| AppError::CacheConnection(format!("invalid Redis URL: {}", e)))?;

        let mut manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Redis connection to {} failed: {}", url, e);
            AppError::CacheConnection(e.to_string())
        })?;

        let _: String = redis::cmd("PING")
            .query_async(&mut manager)
            .await
            .map_err(redis_error)?;

        info!(namespace, "Connected to Redis");
        Ok(Self {
            manager,
            namespace: namespace.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

fn redis_error(err: RedisError) -> AppError {
    match err.kind() {
        ErrorKind::IoError => AppError::CacheConnection(err.to_string()),
        _ => AppError::Cache(err.to_string()),
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = conn.get(self.key(key)).await.map_err(redis_error)?;

        let Some(json) = raw else {
            debug!("cache miss {}", key);
            return Ok(None);
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| AppError::Serialization(format!("cached {} is unreadable: {}", key, e)))
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(self.key(key), json, ttl_secs)
            .await
            .map_err(redis_error)
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        let removed: u32 = conn.del(self.key(key)).await.map_err(redis_error)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.clone();
        conn.exists(self.key(key)).await.map_err(redis_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connect() -> RedisCache {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        RedisCache::with_namespace(&url, &format!("coach-test-{}", uuid::Uuid::new_v4()))
            .await
            .expect("Redis must be running for ignored cache tests")
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_set_get_delete() {
        let cache = connect().await;

        cache.set("route", &"Mumbai-Pune".to_string(), 60).await.unwrap();
        let value: Option<String> = cache.get("route").await.unwrap();
        assert_eq!(value.as_deref(), Some("Mumbai-Pune"));

        assert!(cache.delete("route").await.unwrap());
        assert!(!cache.exists("route").await.unwrap());
        assert!(!cache.delete("route").await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_entries_expire() {
        let cache = connect().await;

        cache.set("short", &1u32, 1).await.unwrap();
        assert!(cache.exists("short").await.unwrap());

        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;
        assert_eq!(cache.get::<u32>("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_bad_url_is_a_connection_error() {
        let err = RedisCache::new("not a redis url").await.err().unwrap();
        assert!(matches!(err, AppError::CacheConnection(_)));
    }
}
