//! Draft Index
//!
//! One record per exercise base key listing every content version a draft
//! was created for. The presentation layer uses it to offer "an older draft
//! of this exercise exists" recovery paths. Dismissal of the "exercise
//! updated" banner is stored as a separate flag per `(base, version)`, so it
//! comes back when the version changes again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::{run_to_completion, DraftEngine, Inner};
use crate::io::KVStore;
use crate::keys::{dismissed_key, index_key};

const DISMISSED_FLAG: &[u8] = b"1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftIndexEntry {
    pub version: String,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftIndexRecord {
    #[serde(default)]
    pub latest_version: String,
    #[serde(default)]
    pub versions: Vec<DraftIndexEntry>,
}

impl DraftIndexRecord {
    /// Insert or replace the entry for `entry.version`, newest first.
    ///
    /// `latest` of `None` keeps the current latest version, or adopts the
    /// entry's version if the index had none.
    pub fn upsert(&mut self, entry: DraftIndexEntry, latest: Option<&str>) {
        match latest {
            Some(latest) => self.latest_version = latest.to_string(),
            None if self.latest_version.is_empty() => {
                self.latest_version = entry.version.clone();
            }
            None => {}
        }
        self.versions.retain(|known| known.version != entry.version);
        self.versions.push(entry);
        self.versions
            .sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    #[must_use]
    pub fn get(&self, version: &str) -> Option<&DraftIndexEntry> {
        self.versions.iter().find(|entry| entry.version == version)
    }
}

/// Entries for every version other than `current`
#[must_use]
pub fn list_other_versions(index: &DraftIndexRecord, current: &str) -> Vec<DraftIndexEntry> {
    index
        .versions
        .iter()
        .filter(|entry| entry.version != current)
        .cloned()
        .collect()
}

/// The "exercise updated" banner: another version is known and the current
/// one was not dismissed
#[must_use]
pub fn shows_updated_banner(index: &DraftIndexRecord, current: &str, dismissed: bool) -> bool {
    !dismissed && index.versions.iter().any(|entry| entry.version != current)
}

/// The "viewing older version" banner: the editor holds a bundle opened by
/// an explicit version that is not the current one
#[must_use]
pub fn shows_viewing_older_banner(opened: Option<&str>, current: &str) -> bool {
    opened.is_some_and(|opened| opened != current)
}

/// Banner decisions for one exercise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BannerState {
    pub show_updated: bool,
    pub show_viewing_older: bool,
    pub older_versions: Vec<DraftIndexEntry>,
}

impl<P: KVStore, F: KVStore> Inner<P, F> {
    pub(crate) async fn load_index(&self, base: &str) -> DraftIndexRecord {
        self.read_json(&index_key(base)).await.unwrap_or_default()
    }

    pub(crate) async fn upsert_version(
        &self,
        base: &str,
        entry: DraftIndexEntry,
        latest: Option<&str>,
    ) -> DraftIndexRecord {
        let key = index_key(base);
        self.queue
            .run(&key, async {
                let mut index = self.load_index(base).await;
                index.upsert(entry, latest);
                if let Err(e) = self.write_json(&key, &index).await {
                    warn!(key = %key, error = %e, "draft index update dropped");
                }
                index
            })
            .await
    }

    async fn is_dismissed(&self, base: &str, version: &str) -> bool {
        self.store.get(&dismissed_key(base, version)).await.is_some()
    }
}

impl<P: KVStore + 'static, F: KVStore + 'static> DraftEngine<P, F> {
    /// Index of `base`; empty when absent or unreadable
    pub async fn load_index(&self, base: &str) -> DraftIndexRecord {
        let key = index_key(base);
        self.inner.queue.run(&key, self.inner.load_index(base)).await
    }

    /// Record a version in `base`'s index and return the updated index
    pub async fn upsert_version(
        &self,
        base: &str,
        entry: DraftIndexEntry,
        latest: Option<&str>,
    ) -> DraftIndexRecord {
        let inner = Arc::clone(&self.inner);
        let (owned_base, owned_entry) = (base.to_string(), entry.clone());
        let owned_latest = latest.map(str::to_string);
        let index = run_to_completion("upsert_version", async move {
            inner
                .upsert_version(&owned_base, owned_entry, owned_latest.as_deref())
                .await
        })
        .await;
        index.unwrap_or_else(|| {
            let mut index = DraftIndexRecord::default();
            index.upsert(entry, latest);
            index
        })
    }

    pub async fn is_dismissed(&self, base: &str, version: &str) -> bool {
        self.inner.is_dismissed(base, version).await
    }

    /// Hide the "exercise updated" banner for this version
    pub async fn dismiss(&self, base: &str, version: &str) {
        let inner = Arc::clone(&self.inner);
        let key = dismissed_key(base, version);
        run_to_completion("dismiss", async move {
            if let Err(e) = inner.store.set(&key, DISMISSED_FLAG).await {
                warn!(key = %key, error = %e, "dismissal dropped");
            }
        })
        .await;
    }

    /// Banner decisions for the exercise at `current`, with `opened` the
    /// explicit version loaded into the editor, if any
    pub async fn banner_state(&self, base: &str, current: &str, opened: Option<&str>) -> BannerState {
        let index = self.load_index(base).await;
        let dismissed = self.is_dismissed(base, current).await;
        BannerState {
            show_updated: shows_updated_banner(&index, current, dismissed),
            show_viewing_older: shows_viewing_older_banner(opened, current),
            older_versions: list_other_versions(&index, current),
        }
    }
}
