//! In-process store over the same contract.
//!
//! Stands in for the orchestration host's string-keyed cache in tests and
//! demos; shares the expiry policy machinery with the SQLite store but keeps
//! entries in a concurrent map instead of rows.

use super::{AbsoluteExpiry, CacheStore, ExpiryPolicy};
use crate::error::{Error, Result};
use crate::item::{now_ticks, CacheItem};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Volatile expiration-aware store backed by a concurrent hash map.
pub struct MemoryStore<V> {
    map: DashMap<String, (CacheItem<V>, i64)>,
    policy: Box<dyn ExpiryPolicy>,
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        MemoryStore {
            map: DashMap::new(),
            policy: Box::new(AbsoluteExpiry),
        }
    }

    /// Replace the expiry policy.
    pub fn with_policy(mut self, policy: Box<dyn ExpiryPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Drop every expired entry.
    pub fn evict_expired(&self) {
        let now = now_ticks();
        self.map.retain(|_, (_, deadline)| *deadline > now);
    }
}

impl<V> CacheStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync,
{
    fn add(&self, item: CacheItem<V>) -> Result<bool> {
        if item.region.is_some() {
            return Err(Error::region_not_supported("add"));
        }

        let now = now_ticks();
        let deadline = self.policy.deadline(item.mode, item.timeout, now);
        // The entry guard makes check-then-insert atomic per key.
        match self.map.entry(item.key.clone()) {
            Entry::Occupied(occupied) if occupied.get().1 > now => Ok(false),
            Entry::Occupied(mut occupied) => {
                occupied.insert((item, deadline));
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert((item, deadline));
                Ok(true)
            }
        }
    }

    fn put(&self, item: CacheItem<V>) -> Result<()> {
        if item.region.is_some() {
            return Err(Error::region_not_supported("put"));
        }

        let now = now_ticks();
        let deadline = self.policy.deadline(item.mode, item.timeout, now);
        self.map.insert(item.key.clone(), (item, deadline));
        Ok(())
    }

    fn get(&self, key: &str, region: Option<&str>) -> Result<Option<CacheItem<V>>> {
        if region.is_some() {
            return Err(Error::region_not_supported("get"));
        }

        let now = now_ticks();
        let mut found_expired = false;
        let hit = self.map.get(key).and_then(|entry| {
            let (item, deadline) = entry.value();
            if *deadline > now {
                let mut item = item.clone();
                item.last_accessed = now;
                Some(item)
            } else {
                found_expired = true;
                None
            }
        });

        if found_expired {
            // Conditional so a fresh entry written since the check survives.
            self.map.remove_if(key, |_, (_, deadline)| *deadline <= now);
        }
        Ok(hit)
    }

    fn exists(&self, key: &str, region: Option<&str>) -> Result<bool> {
        if region.is_some() {
            return Err(Error::region_not_supported("exists"));
        }

        let now = now_ticks();
        Ok(self
            .map
            .get(key)
            .map(|entry| entry.value().1 > now)
            .unwrap_or(false))
    }

    fn remove(&self, key: &str, region: Option<&str>) -> Result<bool> {
        if region.is_some() {
            return Err(Error::region_not_supported("remove"));
        }
        Ok(self.map.remove(key).is_some())
    }

    fn clear(&self) -> Result<()> {
        self.map.clear();
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let now = now_ticks();
        Ok(self.map.iter().filter(|entry| entry.value().1 > now).count() as u64)
    }
}
