//! Two-tier record storage
//!
//! Reads try the primary store, then the fallback. Writes go to the primary
//! and fall through to the fallback when the primary refuses them. A store
//! that reports itself unavailable is skipped for the rest of the
//! `TieredStore`'s lifetime.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use super::types::{KVError, KVStore};

/// Which backend served or accepted an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Fallback,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A backend plus its availability flag
struct Backend<S> {
    store: S,
    tier: Tier,
    up: AtomicBool,
}

impl<S: KVStore> Backend<S> {
    fn new(store: S, tier: Tier) -> Self {
        Self {
            store,
            tier,
            up: AtomicBool::new(true),
        }
    }

    fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }

    /// Record a failure, demoting the backend if it is permanent
    fn note(&self, op: &str, key: &str, err: &KVError) {
        if err.is_permanent() {
            if self.up.swap(false, Ordering::AcqRel) {
                warn!(tier = %self.tier, op, key, error = %err, "backend unavailable, disabling");
            }
        } else {
            warn!(tier = %self.tier, op, key, error = %err, "backend call failed");
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        if !self.is_up() {
            return Err(KVError::Unavailable(format!("{} store disabled", self.tier)));
        }
        let result = self.store.get(key).await;
        if let Err(e) = &result {
            self.note("get", key, e);
        }
        result
    }

    async fn set(&self, key: &str, data: &[u8]) -> Result<(), KVError> {
        if !self.is_up() {
            return Err(KVError::Unavailable(format!("{} store disabled", self.tier)));
        }
        let result = self.store.set(key, data).await;
        if let Err(e) = &result {
            self.note("set", key, e);
        }
        result
    }

    async fn remove(&self, key: &str) -> Result<(), KVError> {
        if !self.is_up() {
            return Err(KVError::Unavailable(format!("{} store disabled", self.tier)));
        }
        let result = self.store.remove(key).await;
        if let Err(e) = &result {
            self.note("remove", key, e);
        }
        result
    }
}

/// Primary-then-fallback record storage
pub struct TieredStore<P, F> {
    primary: Backend<P>,
    fallback: Backend<F>,
}

impl<P: KVStore, F: KVStore> TieredStore<P, F> {
    #[must_use]
    pub fn new(primary: P, fallback: F) -> Self {
        Self {
            primary: Backend::new(primary, Tier::Primary),
            fallback: Backend::new(fallback, Tier::Fallback),
        }
    }

    /// Whether the given tier has not been disabled
    #[must_use]
    pub fn is_available(&self, tier: Tier) -> bool {
        match tier {
            Tier::Primary => self.primary.is_up(),
            Tier::Fallback => self.fallback.is_up(),
        }
    }

    /// Read a record, primary first.
    ///
    /// A primary miss or failure falls through to the fallback. Returns the
    /// data together with the tier that had it.
    pub async fn get(&self, key: &str) -> Option<(Vec<u8>, Tier)> {
        if let Ok(Some(data)) = self.primary.get(key).await {
            return Some((data, Tier::Primary));
        }
        match self.fallback.get(key).await {
            Ok(Some(data)) => Some((data, Tier::Fallback)),
            _ => None,
        }
    }

    /// Write a record, primary first.
    ///
    /// # Errors
    ///
    /// Returns the fallback's error when neither backend accepted the write.
    pub async fn set(&self, key: &str, data: &[u8]) -> Result<Tier, KVError> {
        if self.primary.set(key, data).await.is_ok() {
            return Ok(Tier::Primary);
        }
        self.fallback.set(key, data).await?;
        debug!(key, "write landed on fallback");
        // An older primary record would shadow this write on a cold read
        if self.primary.is_up() {
            if let Err(e) = self.primary.remove(key).await {
                warn!(key, error = %e, "stale primary record left behind");
            }
        }
        Ok(Tier::Fallback)
    }

    /// Read a record from one tier only
    pub async fn get_from(&self, tier: Tier, key: &str) -> Option<Vec<u8>> {
        let result = match tier {
            Tier::Primary => self.primary.get(key).await,
            Tier::Fallback => self.fallback.get(key).await,
        };
        result.ok().flatten()
    }

    /// Remove a record from both backends.
    ///
    /// # Errors
    ///
    /// Fails only when neither backend could remove the key.
    pub async fn remove(&self, key: &str) -> Result<(), KVError> {
        let primary = self.primary.remove(key).await;
        let fallback = self.fallback.remove(key).await;
        match (primary, fallback) {
            (Err(_), Err(e)) => Err(e),
            _ => Ok(()),
        }
    }
}
