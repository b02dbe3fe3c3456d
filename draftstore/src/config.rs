use serde::Deserialize;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::DraftError;

pub const DEFAULT_FALLBACK_QUOTA: usize = 5 * 1024 * 1024;
pub const DEFAULT_LEGACY_VERSION: &str = "legacy";

/// Engine tunables
///
/// Read from a JSON object with camelCase keys; every key is optional.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Decoded bundles kept in memory
    pub cache_capacity: usize,
    /// Byte quota of the in-memory fallback store
    pub fallback_quota_bytes: usize,
    /// Version tag given to archived pre-versioning drafts
    pub legacy_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            fallback_quota_bytes: DEFAULT_FALLBACK_QUOTA,
            legacy_version: DEFAULT_LEGACY_VERSION.to_string(),
        }
    }
}

impl EngineConfig {
    /// Creates a new `EngineConfig` by reading JSON from a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The JSON input is invalid or malformed
    /// - There are I/O errors reading from the provided reader
    pub fn from_reader(reader: impl std::io::Read) -> Result<Self, DraftError> {
        Ok(serde_json::from_reader(reader)?)
    }
}
