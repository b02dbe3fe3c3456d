//! Shared fixtures for draftstore integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use draftstore::{ExerciseContent, ExerciseSource, KVError, KVStore, LanguageSource, MemKV, Starters};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// How a `BrokenKV` fails
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// Storage is switched off; the tiered store should stop calling it
    Unavailable,
    /// Every call fails, but only for that call
    Quota,
}

/// A backend that fails every call
pub struct BrokenKV {
    failure: Failure,
    calls: AtomicUsize,
}

impl BrokenKV {
    pub fn new(failure: Failure) -> Self {
        Self {
            failure,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(Failure::Unavailable)
    }

    pub fn full() -> Self {
        Self::new(Failure::Quota)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail(&self, key: &str) -> KVError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Failure::Unavailable => KVError::Unavailable("storage disabled".to_string()),
            Failure::Quota => KVError::QuotaExceeded {
                key: key.to_string(),
                needed: 1,
                limit: 0,
            },
        }
    }
}

impl KVStore for BrokenKV {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        Err(self.fail(key))
    }

    async fn set(&self, key: &str, _data: &[u8]) -> Result<(), KVError> {
        Err(self.fail(key))
    }

    async fn remove(&self, key: &str) -> Result<(), KVError> {
        Err(self.fail(key))
    }
}

/// A working backend that suspends before every call
pub struct SlowKV {
    inner: MemKV,
    delay: Duration,
}

impl SlowKV {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemKV::new(),
            delay,
        }
    }
}

impl KVStore for SlowKV {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, data: &[u8]) -> Result<(), KVError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set(key, data).await
    }

    async fn remove(&self, key: &str) -> Result<(), KVError> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove(key).await
    }
}

/// Single-language starters with one `js` slot
pub fn js(starter: &str) -> Starters {
    Starters::SingleLanguage(vec![("js".to_string(), starter.to_string())])
}

/// Single-language exercise with one `js` slot
pub fn js_exercise(id: &str, starter: &str, tests: &str) -> ExerciseContent {
    ExerciseContent {
        id: id.to_string(),
        storage_key: None,
        version: None,
        source: ExerciseSource::SingleLanguage {
            languages: vec![LanguageSource {
                lang: "js".to_string(),
                starter: starter.to_string(),
                tests: tests.to_string(),
            }],
        },
    }
}
