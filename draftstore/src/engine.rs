//! Draft Bundle Manager
//!
//! `DraftEngine` owns the storage stack for one process (or one test): the
//! tiered backends, the bundle cache and the per-key queue. It is a cheap
//! handle; clones share the same state.
//!
//! Every public operation is failure-silent. Backend errors are logged and
//! degrade to "the operation had no effect"; callers that need certainty
//! read the value back.
//!
//! Mutations run on a spawned task, so a caller that stops awaiting one does
//! not abort a half-applied write.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, trace, warn};

use crate::bundle::{BundleRecord, InitOutcome, SlotState, Starters};
use crate::cache::BundleCache;
use crate::config::EngineConfig;
use crate::error::DraftError;
use crate::index::DraftIndexEntry;
use crate::io::{KVStore, Tier, TieredStore};
use crate::key_queue::KeyQueue;
use crate::keys::DraftKey;

/// Options for [`DraftEngine::save_field`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Skip the anti-clobber guards
    pub force: bool,
}

impl SaveOptions {
    #[must_use]
    pub fn forced() -> Self {
        Self { force: true }
    }
}

/// Options for [`DraftEngine::clone_bundle`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Replace an existing destination bundle
    pub overwrite: bool,
}

pub(crate) struct Inner<P, F> {
    pub(crate) store: TieredStore<P, F>,
    pub(crate) cache: Mutex<BundleCache>,
    pub(crate) queue: KeyQueue,
    pub(crate) config: EngineConfig,
}

/// Versioned draft storage engine
pub struct DraftEngine<P, F> {
    pub(crate) inner: Arc<Inner<P, F>>,
}

impl<P, F> Clone for DraftEngine<P, F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Run `op` on its own task and wait for it.
///
/// Dropping the returned future does not cancel `op`.
pub(crate) async fn run_to_completion<T>(
    name: &'static str,
    op: impl Future<Output = T> + Send + 'static,
) -> Option<T>
where
    T: Send + 'static,
{
    match tokio::spawn(op).await {
        Ok(value) => Some(value),
        Err(e) => {
            error!(op = name, error = %e, "draft operation aborted");
            None
        }
    }
}

impl<P: KVStore + 'static, F: KVStore + 'static> DraftEngine<P, F> {
    /// Create an engine with the default configuration
    #[must_use]
    pub fn new(primary: P, fallback: F) -> Self {
        Self::with_config(primary, fallback, EngineConfig::default())
    }

    #[must_use]
    pub fn with_config(primary: P, fallback: F, config: EngineConfig) -> Self {
        let inner = Inner {
            store: TieredStore::new(primary, fallback),
            cache: Mutex::new(BundleCache::new(config.cache_capacity)),
            queue: KeyQueue::new(),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Whether a backend is still in use
    #[must_use]
    pub fn backend_available(&self, tier: Tier) -> bool {
        self.inner.store.is_available(tier)
    }

    /// Number of decoded bundles held in memory
    #[must_use]
    pub fn cached_bundles(&self) -> usize {
        self.inner.cache.lock().len()
    }

    /// Load the bundle for `key`, creating it if needed, and seed any slot
    /// that has no baseline yet from `starters`.
    ///
    /// User code is never touched. A newly created bundle is recorded in the
    /// draft index as the latest version of its exercise.
    pub async fn init_bundle(&self, key: &DraftKey, starters: &Starters) -> InitOutcome {
        let inner = Arc::clone(&self.inner);
        let (owned_key, owned_starters) = (key.clone(), starters.clone());
        let outcome = run_to_completion("init_bundle", async move {
            let (view, created) = inner.init(&owned_key, &owned_starters, true).await?;
            if created {
                inner
                    .register_version(&owned_key, view.last_lang.clone(), Utc::now(), true)
                    .await;
            }
            Some(view)
        })
        .await
        .flatten();
        outcome.unwrap_or_else(|| InitOutcome::from_starters(starters))
    }

    /// Open the bundle of an explicit (usually older) version.
    ///
    /// Behaves like [`init_bundle`](Self::init_bundle) but returns `None`
    /// instead of creating a bundle that does not exist.
    pub async fn open_older_draft(&self, key: &DraftKey, starters: &Starters) -> Option<InitOutcome> {
        let inner = Arc::clone(&self.inner);
        let (key, starters) = (key.clone(), starters.clone());
        run_to_completion("open_older_draft", async move {
            inner.init(&key, &starters, false).await.map(|(view, _)| view)
        })
        .await
        .flatten()
    }

    /// Store the editor content of one slot.
    ///
    /// Without `force`, a blank value never replaces saved code, and a value
    /// equal to the baseline never replaces code that already diverged.
    pub async fn save_field(&self, key: &DraftKey, slot: &str, value: &str, opts: SaveOptions) {
        let inner = Arc::clone(&self.inner);
        let (key, slot, value) = (key.clone(), slot.to_string(), value.to_string());
        run_to_completion("save_field", async move {
            inner.save(&key, &slot, &value, opts).await;
        })
        .await;
    }

    /// Force every starter slot back to `code = baseline = starter`
    pub async fn reset_bundle(&self, key: &DraftKey, starters: &Starters) {
        let inner = Arc::clone(&self.inner);
        let (key, starters) = (key.clone(), starters.clone());
        run_to_completion("reset_bundle", async move {
            if let Some(bundle) = inner.reset(&key, &starters).await {
                inner
                    .register_version(&key, bundle.last_lang.clone(), bundle.updated_at, true)
                    .await;
            }
        })
        .await;
    }

    /// Deep-copy a bundle to another key.
    ///
    /// Returns false when the source is absent, when the destination exists
    /// and `overwrite` is not set, or when the copy could not be stored. The
    /// destination version is added to its exercise's draft index.
    pub async fn clone_bundle(&self, from: &DraftKey, to: &DraftKey, opts: CloneOptions) -> bool {
        let inner = Arc::clone(&self.inner);
        let (from, to) = (from.clone(), to.clone());
        run_to_completion("clone_bundle", async move {
            let Some(bundle) = inner
                .copy_record(&from.storage_key(), &to.storage_key(), opts.overwrite)
                .await
            else {
                return false;
            };
            inner
                .register_version(&to, bundle.last_lang.clone(), bundle.updated_at, false)
                .await;
            true
        })
        .await
        .unwrap_or(false)
    }

    /// Remove a bundle from both backends and the cache
    pub async fn clear_bundle(&self, key: &DraftKey) {
        let inner = Arc::clone(&self.inner);
        let key = key.clone();
        run_to_completion("clear_bundle", async move {
            inner.clear(&key.storage_key()).await;
        })
        .await;
    }

    /// Remember which language the user last worked in
    pub async fn set_last_lang(&self, key: &DraftKey, lang: &str) {
        let inner = Arc::clone(&self.inner);
        let (key, lang) = (key.clone(), lang.to_string());
        run_to_completion("set_last_lang", async move {
            inner.set_last_lang(&key, &lang).await;
        })
        .await;
    }

    /// Snapshot of a stored bundle
    pub async fn bundle(&self, key: &DraftKey) -> Option<BundleRecord> {
        let skey = key.storage_key();
        self.inner
            .queue
            .run(&skey, self.inner.read_bundle(&skey))
            .await
            .map(|bundle| (*bundle).clone())
    }

    /// Code, baseline and dirty flag of one slot
    pub async fn slot_state(&self, key: &DraftKey, slot: &str) -> Option<SlotState> {
        let bundle = self.bundle(key).await?;
        bundle.slots.get(slot).map(SlotState::from)
    }
}

impl<P: KVStore, F: KVStore> Inner<P, F> {
    fn cached(&self, key: &str) -> Option<Arc<BundleRecord>> {
        self.cache.lock().get(key)
    }

    fn remember(&self, key: &str, bundle: Arc<BundleRecord>) {
        self.cache.lock().put(key, bundle);
    }

    fn forget(&self, key: &str) {
        self.cache.lock().remove(key);
    }

    /// Cache, then primary, then fallback. A malformed primary record falls
    /// through to the fallback; a malformed record in both is absent.
    pub(crate) async fn read_bundle(&self, key: &str) -> Option<Arc<BundleRecord>> {
        if let Some(bundle) = self.cached(key) {
            trace!(key, "bundle cache hit");
            return Some(bundle);
        }
        let (data, tier) = self.store.get(key).await?;
        let decoded = match BundleRecord::decode(&data) {
            Some(bundle) => Some(bundle),
            None if tier == Tier::Primary => {
                warn!(key, %tier, "malformed bundle record, trying fallback");
                let data = self.store.get_from(Tier::Fallback, key).await;
                data.and_then(|data| BundleRecord::decode(&data))
            }
            None => None,
        };
        let Some(bundle) = decoded else {
            warn!(key, "no readable bundle record, treating as absent");
            return None;
        };
        let bundle = Arc::new(bundle);
        self.remember(key, Arc::clone(&bundle));
        Some(bundle)
    }

    /// Store a bundle; the cache only learns about writes that landed
    pub(crate) async fn write_bundle(&self, key: &str, bundle: BundleRecord) -> Result<Tier, DraftError> {
        let data = bundle.encode()?;
        let tier = self.store.set(key, &data).await?;
        self.remember(key, Arc::new(bundle));
        Ok(tier)
    }

    pub(crate) async fn read_json<T: DeserializeOwned + Send>(&self, key: &str) -> Option<T> {
        let (data, tier) = self.store.get(key).await?;
        match serde_json::from_slice(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, %tier, error = %e, "malformed record, treating as absent");
                None
            }
        }
    }

    pub(crate) async fn write_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<Tier, DraftError> {
        let data = serde_json::to_vec(value)?;
        Ok(self.store.set(key, &data).await?)
    }

    /// Returns the view and whether the bundle was created by this call
    async fn init(&self, key: &DraftKey, starters: &Starters, create: bool) -> Option<(InitOutcome, bool)> {
        let skey = key.storage_key();
        self.queue
            .run(&skey, async {
                let existing = self.read_bundle(&skey).await;
                if existing.is_none() && !create {
                    debug!(key = %skey, "no draft stored for this version");
                    return None;
                }

                let mut created = existing.is_none();
                let mut bundle = existing.map(|bundle| (*bundle).clone()).unwrap_or_default();
                let seeded = bundle.seed(starters);
                let view = bundle.view();
                if created || seeded {
                    if let Err(e) = self.write_bundle(&skey, bundle).await {
                        warn!(key = %skey, error = %e, "could not store seeded bundle, write dropped");
                        created = false;
                    }
                }
                Some((view, created))
            })
            .await
    }

    async fn save(&self, key: &DraftKey, slot: &str, value: &str, opts: SaveOptions) {
        let skey = key.storage_key();
        self.queue
            .run(&skey, async {
                let mut bundle = self
                    .read_bundle(&skey)
                    .await
                    .map(|bundle| (*bundle).clone())
                    .unwrap_or_default();

                if !opts.force {
                    let verdict = bundle.slots.get(slot).map(|record| record.check_save(value));
                    if let Some(Err(rejection)) = verdict {
                        debug!(key = %skey, slot, ?rejection, "save refused");
                        return;
                    }
                }

                bundle.write_code(slot, value, Utc::now());
                match self.write_bundle(&skey, bundle).await {
                    Ok(tier) => trace!(key = %skey, slot, %tier, "slot saved"),
                    Err(e) => warn!(key = %skey, slot, error = %e, "save dropped"),
                }
            })
            .await;
    }

    /// Returns the stored bundle if this call created it
    async fn reset(&self, key: &DraftKey, starters: &Starters) -> Option<BundleRecord> {
        let skey = key.storage_key();
        self.queue
            .run(&skey, async {
                let existing = self.read_bundle(&skey).await;
                let created = existing.is_none();
                let mut bundle = existing.map(|bundle| (*bundle).clone()).unwrap_or_default();
                bundle.reset(starters, Utc::now());

                match self.write_bundle(&skey, bundle.clone()).await {
                    Ok(_) => created.then_some(bundle),
                    Err(e) => {
                        warn!(key = %skey, error = %e, "reset dropped");
                        None
                    }
                }
            })
            .await
    }

    /// Copy the record at `from` to `to`; returns the copy if it was stored
    pub(crate) async fn copy_record(&self, from: &str, to: &str, overwrite: bool) -> Option<Arc<BundleRecord>> {
        let source = self.queue.run(from, self.read_bundle(from)).await?;

        self.queue
            .run(to, async {
                if !overwrite && self.read_bundle(to).await.is_some() {
                    debug!(from, to, "destination exists, not overwriting");
                    return None;
                }
                match self.write_bundle(to, (*source).clone()).await {
                    Ok(_) => Some(Arc::clone(&source)),
                    Err(e) => {
                        warn!(from, to, error = %e, "clone dropped");
                        None
                    }
                }
            })
            .await
    }

    async fn clear(&self, key: &str) {
        self.queue
            .run(key, async {
                if let Err(e) = self.store.remove(key).await {
                    warn!(key, error = %e, "could not remove bundle");
                }
                self.forget(key);
            })
            .await;
    }

    async fn set_last_lang(&self, key: &DraftKey, lang: &str) {
        let skey = key.storage_key();
        self.queue
            .run(&skey, async {
                let Some(existing) = self.read_bundle(&skey).await else {
                    return;
                };
                if existing.last_lang.as_deref() == Some(lang) {
                    return;
                }
                let mut bundle = (*existing).clone();
                bundle.last_lang = Some(lang.to_string());
                if let Err(e) = self.write_bundle(&skey, bundle).await {
                    warn!(key = %skey, error = %e, "last language not stored");
                }
            })
            .await;
    }

    /// Add `key`'s version to its exercise's index
    pub(crate) async fn register_version(
        &self,
        key: &DraftKey,
        lang: Option<String>,
        updated_at: chrono::DateTime<Utc>,
        latest: bool,
    ) {
        let entry = DraftIndexEntry {
            version: key.version().to_string(),
            updated_at,
            lang,
        };
        let latest = latest.then(|| key.version());
        self.upsert_version(key.base(), entry, latest).await;
    }
}
