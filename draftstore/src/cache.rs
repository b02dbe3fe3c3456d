//! Bounded, recency-ordered cache of decoded bundles
//!
//! Sits in front of the storage backends so hot keys are not decoded again on
//! every read. Entries are kept in a `LinkedHashMap` ordered from least to
//! most recently used; inserting past capacity evicts from the front.

use std::sync::Arc;

use linked_hash_map::LinkedHashMap;
use tracing::trace;

use crate::bundle::BundleRecord;

pub const DEFAULT_CACHE_CAPACITY: usize = 50;

pub struct BundleCache {
    entries: LinkedHashMap<String, Arc<BundleRecord>>,
    capacity: usize,
}

impl BundleCache {
    /// Create a cache holding at most `capacity` bundles (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LinkedHashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Look up a bundle and mark it most recently used
    pub fn get(&mut self, key: &str) -> Option<Arc<BundleRecord>> {
        self.entries.get_refresh(key).map(|bundle| Arc::clone(bundle))
    }

    /// Insert or replace a bundle, evicting the least recently used on overflow
    pub fn put(&mut self, key: &str, bundle: Arc<BundleRecord>) {
        // Re-inserting moves the key to the back
        self.entries.remove(key);
        self.entries.insert(key.to_string(), bundle);
        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                trace!(key = %evicted, "evicted from bundle cache");
            }
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BundleCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
