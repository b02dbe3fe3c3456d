//! In-memory implementation of KVStore

use super::types::{KVError, KVStore};
use parking_lot::Mutex;
use std::collections::HashMap;

struct MemState {
    records: HashMap<String, Vec<u8>>,
    used: usize,
}

/// In-memory implementation of KVStore
///
/// Simple hash map based storage. Every call completes without suspending,
/// which makes it the natural fallback store. An optional quota bounds the
/// total number of key and value bytes held; a write that would cross it
/// fails with `KVError::QuotaExceeded` and leaves the store unchanged.
pub struct MemKV {
    state: Mutex<MemState>,
    quota: Option<usize>,
}

impl MemKV {
    /// Create a new empty, unbounded MemKV store
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemState {
                records: HashMap::new(),
                used: 0,
            }),
            quota: None,
        }
    }

    /// Create a new empty store holding at most `quota` bytes
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::new()
        }
    }

    /// Bytes currently accounted against the quota
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.state.lock().used
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of stored keys
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().records.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for MemKV {
    fn default() -> Self {
        Self::new()
    }
}

impl KVStore for MemKV {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        Ok(self.state.lock().records.get(key).cloned())
    }

    async fn set(&self, key: &str, data: &[u8]) -> Result<(), KVError> {
        let mut state = self.state.lock();

        let released = state
            .records
            .get(key)
            .map_or(0, |old| key.len() + old.len());
        let used = state.used - released + key.len() + data.len();
        if let Some(limit) = self.quota {
            if used > limit {
                return Err(KVError::QuotaExceeded {
                    key: key.to_string(),
                    needed: key.len() + data.len(),
                    limit,
                });
            }
        }

        state.records.insert(key.to_string(), data.to_vec());
        state.used = used;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), KVError> {
        let mut state = self.state.lock();
        if let Some(old) = state.records.remove(key) {
            state.used -= key.len() + old.len();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let kv = MemKV::new();

        kv.set("test/key", b"hello world").await.unwrap();

        let data = kv.get("test/key").await.unwrap();
        assert_eq!(data.as_deref(), Some(&b"hello world"[..]));
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let kv = MemKV::new();
        assert_eq!(kv.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let kv = MemKV::new();

        kv.set("k", b"initial data").await.unwrap();
        kv.set("k", b"new").await.unwrap();

        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some(&b"new"[..]));
        assert_eq!(kv.used_bytes(), 1 + 3);
    }

    #[tokio::test]
    async fn test_remove() {
        let kv = MemKV::new();

        kv.set("path1", b"a").await.unwrap();
        kv.set("path2", b"b").await.unwrap();
        kv.remove("path1").await.unwrap();
        // Removing twice is fine
        kv.remove("path1").await.unwrap();

        assert_eq!(kv.keys(), vec!["path2"]);
        assert_eq!(kv.used_bytes(), 5 + 1);
    }

    #[tokio::test]
    async fn test_quota_rejects_and_keeps_old_value() {
        let kv = MemKV::with_quota(10);

        kv.set("k", b"12345").await.unwrap();
        let err = kv.set("k", b"1234567890").await.unwrap_err();
        assert!(matches!(err, KVError::QuotaExceeded { limit: 10, .. }));
        assert!(!err.is_permanent());

        assert_eq!(kv.get("k").await.unwrap().as_deref(), Some(&b"12345"[..]));
    }

    #[tokio::test]
    async fn test_quota_counts_replaced_value_once() {
        let kv = MemKV::with_quota(10);

        kv.set("k", b"123456789").await.unwrap();
        // Replacing frees the old value first
        kv.set("k", b"987654321").await.unwrap();
        assert_eq!(kv.used_bytes(), 10);
    }
}
