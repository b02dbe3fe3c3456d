pub mod bundle;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod io;
pub mod key_queue;
pub mod keys;
pub mod migrate;
pub mod versioner;

// Re-export bundle types for convenience
pub use bundle::{
    BundleRecord, GuardRejection, InitOutcome, SlotRecord, SlotState, SlotView, Starters,
    MARKUP_SLOT, STYLE_SLOT,
};

// Re-export engine types for convenience
pub use engine::{CloneOptions, DraftEngine, SaveOptions};

// Re-export KV types for convenience
pub use io::{KVError, KVStore, MemKV, Tier, TieredStore};
#[cfg(feature = "sqlitekv")]
pub use io::SqliteKV;

// Re-export index types
pub use index::{
    list_other_versions, shows_updated_banner, shows_viewing_older_banner, BannerState,
    DraftIndexEntry, DraftIndexRecord,
};

pub use cache::BundleCache;
pub use config::EngineConfig;
pub use error::DraftError;
pub use key_queue::KeyQueue;
pub use keys::{base_key, DraftKey};
pub use versioner::{compute_version, ExerciseContent, ExerciseSource, LanguageSource};
