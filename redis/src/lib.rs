//! Redis-backed entity cache for Nestly.
//!
//! Snapshots live under the canonical key scheme
//! (`booking:{id}`, `user:{id}:bookings`, ...) with a fixed per-entry TTL,
//! so anything the write path fails to invalidate still expires passively.
//! The cache is derived, expendable state: on any failure here callers
//! fall through to the record store.

use nestly_core::cache::{CacheError, EntityCache};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Redis [`EntityCache`] using a multiplexed connection manager.
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the client cannot be created
    /// or the connection manager cannot be established.
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(format!("failed to create client: {e}")))?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            CacheError::Unavailable(format!("failed to create connection manager: {e}"))
        })?;
        Ok(Self { conn_manager })
    }
}

impl EntityCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.conn_manager.clone();
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| CacheError::Unavailable(format!("GET {key}: {e}")))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        let ttl_seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, ttl_seconds)
            .await
            .map_err(|e| CacheError::Unavailable(format!("SETEX {key}: {e}")))?;
        tracing::trace!(key = %key, ttl_seconds = ttl_seconds, "cached snapshot");
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn_manager.clone();
        let _: () = conn
            .del(keys)
            .await
            .map_err(|e| CacheError::Unavailable(format!("DEL {keys:?}: {e}")))?;
        tracing::trace!(keys = ?keys, "invalidated cache entries");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // These tests require a running Redis instance:
    // docker run -d -p 6379:6379 redis:7-alpine

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn snapshot_lifecycle() {
        let cache = RedisCache::new("redis://127.0.0.1:6379").await.unwrap();

        let key = format!("booking:test-{}", std::process::id());
        cache
            .set(&key, b"snapshot", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some(&b"snapshot"[..]));

        cache.delete(std::slice::from_ref(&key)).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn entries_expire_with_their_ttl() {
        let cache = RedisCache::new("redis://127.0.0.1:6379").await.unwrap();

        let key = format!("listing:ttl-{}", std::process::id());
        cache.set(&key, b"v", Duration::from_secs(1)).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn deleting_missing_keys_is_not_an_error() {
        let cache = RedisCache::new("redis://127.0.0.1:6379").await.unwrap();
        cache
            .delete(&["booking:missing".to_string(), "user:0:bookings".to_string()])
            .await
            .unwrap();
    }
}
