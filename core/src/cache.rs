//! Read cache abstraction.
//!
//! The cache holds derived, expendable snapshots of entities and
//! collections; the record store always wins on conflict and the cache
//! must never be the last writer of truth. The capability comes in two
//! variants: a real backend (`RedisCache` in `nestly-redis`) and the
//! absent [`NoopCache`], so code paths and tests can run cache-off
//! without mocks.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Errors from cache operations.
///
/// Cache failure is never fatal to a request: readers fall through to the
/// record store and writers log and drop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The cache backend could not be reached or refused the operation.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Canonical cache key scheme.
///
/// Singletons are `entity:{id}`; owner-scoped collections are
/// `{ownerRole}:{ownerId}:{entityPlural}`.
pub mod keys {
    use crate::model::{BookingId, ListingId, UserId};

    /// Key for a single booking snapshot.
    #[must_use]
    pub fn booking(id: BookingId) -> String {
        format!("booking:{id}")
    }

    /// Key for a single listing snapshot.
    #[must_use]
    pub fn listing(id: ListingId) -> String {
        format!("listing:{id}")
    }

    /// Key for the collection of a guest's bookings.
    #[must_use]
    pub fn guest_bookings(guest_id: UserId) -> String {
        format!("user:{guest_id}:bookings")
    }

    /// Key for the collection of bookings across a host's listings.
    #[must_use]
    pub fn host_bookings(host_id: UserId) -> String {
        format!("host:{host_id}:bookings")
    }
}

/// Key-addressed, TTL-bounded snapshot store.
pub trait EntityCache: Send + Sync {
    /// Fetch the value at `key`, if present and unexpired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend failed.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, CacheError>> + Send;

    /// Store `value` at `key` with the given expiry.
    ///
    /// Overwrite semantics are idempotent; no locking is required.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend failed.
    fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> impl Future<Output = Result<(), CacheError>> + Send;

    /// Delete every key in `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the backend failed.
    fn delete(&self, keys: &[String]) -> impl Future<Output = Result<(), CacheError>> + Send;
}

/// The absent cache: every read misses, every write succeeds and is
/// dropped. Requests behave exactly as with a cold cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create the no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EntityCache for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BookingId, UserId};

    #[test]
    fn key_scheme_matches_wire_format() {
        assert_eq!(keys::booking(BookingId(9)), "booking:9");
        assert_eq!(keys::guest_bookings(UserId(42)), "user:42:bookings");
        assert_eq!(keys::host_bookings(UserId(7)), "host:7:bookings");
    }

    #[tokio::test]
    async fn noop_cache_always_misses() {
        let cache = NoopCache::new();
        cache
            .set("booking:1", b"snapshot", Duration::from_secs(60))
            .await
            .ok();
        assert_eq!(cache.get("booking:1").await, Ok(None));
    }
}
