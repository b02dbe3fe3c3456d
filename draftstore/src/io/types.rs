//! Key-value storage types and traits

use std::future::Future;
use std::sync::Arc;

/// Errors that can occur in KV operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KVError {
    /// The backend cannot be used at all (disabled storage, missing database)
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The write does not fit into the backend's quota
    #[error("quota exceeded writing {key}: {needed} bytes needed, limit is {limit}")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },

    /// Any other per-call failure
    #[error("backend failure on {key}: {reason}")]
    Backend { key: String, reason: String },
}

impl KVError {
    /// Whether the backend should be skipped from now on
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Trait for key-value record storage backends
///
/// Provides async operations for storing and retrieving serialized records.
/// Each record is identified by a string key. A missing key is not an error:
/// `get` returns `Ok(None)`.
pub trait KVStore: Send + Sync {
    /// Read the record stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, KVError>> + Send;

    /// Store `data` under `key`, replacing any previous record.
    fn set(&self, key: &str, data: &[u8]) -> impl Future<Output = Result<(), KVError>> + Send;

    /// Remove the record under `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), KVError>> + Send;
}

impl<T: KVStore> KVStore for Arc<T> {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, KVError>> + Send {
        (**self).get(key)
    }

    fn set(&self, key: &str, data: &[u8]) -> impl Future<Output = Result<(), KVError>> + Send {
        (**self).set(key, data)
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), KVError>> + Send {
        (**self).remove(key)
    }
}
