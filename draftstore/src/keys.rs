//! Storage key grammar
//!
//! ```text
//! bundle     draft:<exercise>::<version>
//! index      draft-index:draft:<exercise>
//! dismissal  draft-dismissed:draft:<exercise>:<version>
//! ```

use std::fmt;

pub const BASE_PREFIX: &str = "draft:";
pub const VERSION_SEPARATOR: &str = "::";
pub const INDEX_PREFIX: &str = "draft-index:";
pub const DISMISSED_PREFIX: &str = "draft-dismissed:";

/// Base key of an exercise; the alias wins over the id
#[must_use]
pub fn base_key(exercise_id: &str, alias: Option<&str>) -> String {
    let name = alias.filter(|alias| !alias.is_empty()).unwrap_or(exercise_id);
    format!("{BASE_PREFIX}{name}")
}

#[must_use]
pub fn index_key(base: &str) -> String {
    format!("{INDEX_PREFIX}{base}")
}

#[must_use]
pub fn dismissed_key(base: &str, version: &str) -> String {
    format!("{DISMISSED_PREFIX}{base}:{version}")
}

/// Address of one bundle: an exercise base key at one content version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DraftKey {
    base: String,
    version: String,
}

impl DraftKey {
    #[must_use]
    pub fn new(base: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            version: version.into(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Same exercise, another version
    #[must_use]
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self::new(self.base.clone(), version)
    }

    /// The key the bundle is stored under
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}{VERSION_SEPARATOR}{}", self.base, self.version)
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{VERSION_SEPARATOR}{}", self.base, self.version)
    }
}
