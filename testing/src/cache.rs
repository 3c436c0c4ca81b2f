//! In-memory cache doubles.

use nestly_core::cache::{CacheError, EntityCache};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-memory [`EntityCache`] with real TTL expiry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live entry exists for `key`, for assertions.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner
            .lock()
            .map(|entries| {
                entries
                    .get(key)
                    .is_some_and(|entry| entry.expires_at > Instant::now())
            })
            .unwrap_or(false)
    }
}

impl EntityCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self
            .inner
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))?;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self
            .inner
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))?;
        entries.insert(
            key.to_string(),
            Entry {
                bytes: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self
            .inner
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".to_string()))?;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }
}

/// Cache whose every operation fails, for exercising degradation paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCache;

impl UnavailableCache {
    /// Create the always-failing cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EntityCache for UnavailableCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Err(CacheError::Unavailable("cache offline".to_string()))
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("cache offline".to_string()))
    }

    async fn delete(&self, _keys: &[String]) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("cache offline".to_string()))
    }
}
