use std::io;

use crate::io::KVError;

/// Error type for record and configuration handling
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] KVError),
}
