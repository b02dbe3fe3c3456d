//! Archival of pre-versioning drafts
//!
//! Before drafts were tied to a content version they were stored directly
//! under the exercise's base key. Such a record is moved to a bundle under
//! the configured legacy version, so it shows up as an older draft instead
//! of being shadowed by the versioned bundles.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bundle::BundleRecord;
use crate::engine::{run_to_completion, DraftEngine, Inner};
use crate::io::KVStore;
use crate::keys::DraftKey;

impl<P: KVStore, F: KVStore> Inner<P, F> {
    async fn migrate_legacy(&self, base: &str) -> bool {
        let legacy = self
            .queue
            .run(base, async {
                let (data, _) = self.store.get(base).await?;
                let bundle = BundleRecord::decode_any(&data);
                if bundle.is_none() {
                    warn!(key = base, "unreadable legacy draft left in place");
                }
                bundle
            })
            .await;
        let Some(bundle) = legacy else {
            return false;
        };

        let key = DraftKey::new(base, self.config.legacy_version.clone());
        let skey = key.storage_key();
        let archived = self
            .queue
            .run(&skey, async {
                if self.read_bundle(&skey).await.is_some() {
                    debug!(key = %skey, "legacy draft already archived");
                    return Some(false);
                }
                match self.write_bundle(&skey, bundle.clone()).await {
                    Ok(_) => Some(true),
                    Err(e) => {
                        warn!(key = %skey, error = %e, "legacy archive dropped");
                        None
                    }
                }
            })
            .await;

        // Keep the only copy if it could not be archived
        let Some(written) = archived else {
            return false;
        };

        self.queue
            .run(base, async {
                if let Err(e) = self.store.remove(base).await {
                    warn!(key = base, error = %e, "could not remove legacy draft");
                }
            })
            .await;

        if written {
            info!(key = %skey, "archived legacy draft");
            self.register_version(&key, bundle.last_lang.clone(), bundle.updated_at, false)
                .await;
        }
        written
    }
}

impl<P: KVStore + 'static, F: KVStore + 'static> DraftEngine<P, F> {
    /// Move a draft stored under the bare base key to the legacy version.
    ///
    /// Returns whether an archive bundle was written. The bare record is
    /// removed once an archive exists.
    pub async fn migrate_legacy(&self, base: &str) -> bool {
        let inner = Arc::clone(&self.inner);
        let base = base.to_string();
        run_to_completion("migrate_legacy", async move { inner.migrate_legacy(&base).await })
            .await
            .unwrap_or(false)
    }
}
