//! I/O module for draft storage
//!
//! Contains storage abstractions and implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  DraftEngine (bundle manager)       │
//! │  - per-key queue                    │
//! │  - bundle cache                     │
//! └─────────────────────────────────────┘
//!          ▲
//!          │ serialized records
//!          ▼
//! ┌─────────────────────────────────────┐
//! │  TieredStore                        │
//! │  - primary first, fallback second   │
//! │  - disables unavailable backends    │
//! └─────────────────────────────────────┘
//!      ▲                     ▲
//!      │                     │
//!   SqliteKV (primary)    MemKV (fallback)
//! ```

pub mod memkv;
#[cfg(feature = "sqlitekv")]
pub mod sqlitekv;
pub mod tiered;
pub mod types;

pub use memkv::MemKV;
#[cfg(feature = "sqlitekv")]
pub use sqlitekv::SqliteKV;
pub use tiered::{Tier, TieredStore};
pub use types::{KVError, KVStore};
