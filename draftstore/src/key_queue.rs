//! Per-key operation queue
//!
//! Guarantees at most one in-flight operation per storage key. Each key owns
//! a fair async mutex; an operation waits for every earlier operation on the
//! same key to settle, in arrival order, then runs. Operations on different
//! keys never wait on each other.
//!
//! This is what makes read-modify-write sequences ("load bundle, change a
//! slot, save bundle") safe against a concurrent caller touching the same
//! bundle:
//!
//! ```ignore
//! queue.run(&key, async {
//!     let mut bundle = load(&key).await;
//!     bundle.apply(edit);
//!     save(&key, &bundle).await;
//! }).await;
//! ```
//!
//! The operation future is lazy, so nothing in it starts before its turn.
//! Entries are removed from the map when the last pending operation on the
//! key finishes.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Tail of the queue for one key
type Turnstile = Arc<tokio::sync::Mutex<()>>;

#[derive(Default)]
pub struct KeyQueue {
    tails: Mutex<HashMap<String, Turnstile>>,
}

impl KeyQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` after all earlier operations on `key` have finished
    pub async fn run<T>(&self, key: &str, op: impl Future<Output = T>) -> T {
        let turnstile = {
            let mut tails = self.tails.lock();
            Arc::clone(tails.entry(key.to_string()).or_default())
        };

        let result = {
            let _turn = turnstile.lock().await;
            op.await
        };

        // Clones are taken and dropped only under the map lock, so the last
        // finisher sees the map's reference as the only one left.
        let mut tails = self.tails.lock();
        drop(turnstile);
        let idle = tails
            .get(key)
            .is_some_and(|tail| Arc::strong_count(tail) == 1);
        if idle {
            tails.remove(key);
        }
        result
    }

    /// Number of keys with a pending or running operation
    #[must_use]
    pub fn pending_keys(&self) -> usize {
        self.tails.lock().len()
    }
}
