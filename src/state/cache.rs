//! Bounded detail-record cache keyed by identity
//!
//! Eviction removes the least recently accessed entry. Access order is tracked
//! with a logical clock rather than wall time, so two entries never share a
//! timestamp and the victim is always unambiguous.

use crate::record::DetailRecord;
use crate::ConfigError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// A cached record together with its last access tick
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: DetailRecord,
    pub last_access: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
}

impl CacheInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&oldest);
        Some(oldest)
    }
}

/// Thread-safe result cache shared by every worker of a run
#[derive(Debug)]
pub struct ResultCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl ResultCache {
    /// Creates a cache holding at most `capacity` records
    ///
    /// # Returns
    ///
    /// * `Err(ConfigError::Validation)` - if `capacity` is zero
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::Validation(
                "cache capacity must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a record and marks it as most recently accessed
    pub fn get(&self, identity: &str) -> Option<DetailRecord> {
        let mut inner = self.lock();
        let now = inner.tick();
        let entry = inner.entries.get_mut(identity)?;
        entry.last_access = now;
        Some(entry.record.clone())
    }

    /// Stores a record, evicting the least recently accessed entry when full
    ///
    /// Replacing an existing identity never evicts anything.
    pub fn put(&self, identity: &str, record: DetailRecord) {
        let mut inner = self.lock();
        let now = inner.tick();

        if let Some(entry) = inner.entries.get_mut(identity) {
            entry.record = record;
            entry.last_access = now;
            return;
        }

        if inner.entries.len() >= self.capacity {
            if let Some(evicted) = inner.evict_oldest() {
                tracing::trace!(identity = %evicted, "Evicted cache entry");
            }
        }

        inner.entries.insert(
            identity.to_string(),
            CacheEntry {
                record,
                last_access: now,
            },
        );
    }

    /// Returns true if the identity is cached, without touching its access time
    pub fn contains(&self, identity: &str) -> bool {
        self.lock().entries.contains_key(identity)
    }
}
