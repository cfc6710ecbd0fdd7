//! In-memory cache client for tests and cacheless deployments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;

use super::{CacheClient, CacheError};

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Bytes,
    ttl_seconds: u64,
    expires_at: Instant,
}

impl StoredEntry {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Process-local [`CacheClient`] with real TTL expiry and a switch that
/// simulates an unreachable backend.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, StoredEntry>>,
    unavailable: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following operation fail with [`CacheError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// TTL the key was stored with, if it is present and not expired.
    pub fn ttl_seconds(&self, key: &str) -> Option<u64> {
        let entries = self.lock_entries();
        entries
            .get(key)
            .filter(|entry| !entry.expired())
            .map(|entry| entry.ttl_seconds)
    }

    /// Whether the key is present and not expired.
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.lock_entries();
        entries.get(key).is_some_and(|entry| !entry.expired())
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, StoredEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("simulated outage".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.check_available()?;
        let mut entries = self.lock_entries();
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl_seconds: u64) -> Result<(), CacheError> {
        self.check_available()?;
        let entry = StoredEntry {
            value,
            ttl_seconds,
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        };
        self.lock_entries().insert(key.to_owned(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.check_available()?;
        self.lock_entries().remove(key);
        Ok(())
    }
}
