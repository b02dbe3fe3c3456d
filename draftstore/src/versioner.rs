//! Content Versioner
//!
//! Derives the version tag that ties a draft to one revision of an
//! exercise. The tag is the cache-invalidation key for the whole engine:
//! two exercises with identical starter and test content must map to the
//! same tag in every process, and any edit to either must change it.
//!
//! # Field order
//!
//! Fields are hashed as labeled pairs, in this order:
//!
//! | shape           | fields                                               |
//! |-----------------|------------------------------------------------------|
//! | all             | `type` (`single`, `dual` or `project`)               |
//! | single-language | per language, as declared: `starter.<lang>`, `tests.<lang>` |
//! | dual-file       | `starter.html`, `starter.css`, `tests`               |
//! | project         | per path, sorted: `file.<path>`; then `tests`        |
//!
//! Each pair is written as `<len>:<key>\n<len>:<value>\n` with byte lengths,
//! so `("ab", "c")` and `("a", "bc")` never produce the same input. Line
//! endings in values are normalized to `\n` first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bundle::{Starters, MARKUP_SLOT, STYLE_SLOT};
use crate::keys::{base_key, DraftKey};

pub const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over raw bytes
#[must_use]
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Exercise content as supplied by the question service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseContent {
    pub id: String,
    /// Alias under which drafts are stored instead of `id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    /// Explicit version, overriding the computed hash when non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub source: ExerciseSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageSource {
    pub lang: String,
    pub starter: String,
    #[serde(default)]
    pub tests: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExerciseSource {
    #[serde(rename_all = "camelCase")]
    SingleLanguage { languages: Vec<LanguageSource> },
    #[serde(rename_all = "camelCase")]
    DualFile {
        markup: String,
        style: String,
        #[serde(default)]
        tests: String,
    },
    #[serde(rename_all = "camelCase")]
    Project {
        files: BTreeMap<String, String>,
        entry_file: String,
        #[serde(default)]
        tests: String,
    },
}

impl ExerciseContent {
    /// The labeled fields that make up the version, in hashing order
    #[must_use]
    pub fn version_fields(&self) -> Vec<(String, &str)> {
        let mut fields: Vec<(String, &str)> = Vec::new();
        match &self.source {
            ExerciseSource::SingleLanguage { languages } => {
                fields.push(("type".to_string(), "single"));
                for lang in languages {
                    fields.push((format!("starter.{}", lang.lang), lang.starter.as_str()));
                    fields.push((format!("tests.{}", lang.lang), lang.tests.as_str()));
                }
            }
            ExerciseSource::DualFile {
                markup,
                style,
                tests,
            } => {
                fields.push(("type".to_string(), "dual"));
                fields.push((format!("starter.{MARKUP_SLOT}"), markup.as_str()));
                fields.push((format!("starter.{STYLE_SLOT}"), style.as_str()));
                fields.push(("tests".to_string(), tests.as_str()));
            }
            ExerciseSource::Project { files, tests, .. } => {
                fields.push(("type".to_string(), "project"));
                for (path, content) in files {
                    fields.push((format!("file.{path}"), content.as_str()));
                }
                fields.push(("tests".to_string(), tests.as_str()));
            }
        }
        fields
    }

    /// Starter content for the bundle manager
    #[must_use]
    pub fn starters(&self) -> Starters {
        match &self.source {
            ExerciseSource::SingleLanguage { languages } => Starters::SingleLanguage(
                languages
                    .iter()
                    .map(|lang| (lang.lang.clone(), lang.starter.clone()))
                    .collect(),
            ),
            ExerciseSource::DualFile { markup, style, .. } => Starters::DualFile {
                markup: markup.clone(),
                style: style.clone(),
            },
            ExerciseSource::Project {
                files, entry_file, ..
            } => Starters::Project {
                files: files.clone(),
                entry_file: entry_file.clone(),
            },
        }
    }

    #[must_use]
    pub fn base_key(&self) -> String {
        base_key(&self.id, self.storage_key.as_deref())
    }

    /// Key of the bundle for the current content
    #[must_use]
    pub fn draft_key(&self) -> DraftKey {
        DraftKey::new(self.base_key(), compute_version(self))
    }
}

fn normalize_newlines(value: &str) -> String {
    value.replace("\r\n", "\n").replace('\r', "\n")
}

/// Version tag of the exercise content
#[must_use]
pub fn compute_version(content: &ExerciseContent) -> String {
    if let Some(explicit) = content.version.as_deref() {
        if !explicit.is_empty() {
            return explicit.to_string();
        }
    }

    let mut input = String::new();
    for (key, value) in content.version_fields() {
        let value = normalize_newlines(value);
        input.push_str(&format!("{}:{key}\n{}:{value}\n", key.len(), value.len()));
    }
    format!("{:x}", fnv1a64(input.as_bytes()))
}
