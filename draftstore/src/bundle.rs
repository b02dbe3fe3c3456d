//! Bundle records and the rules applied to them
//!
//! A bundle is the persisted draft for one exercise at one content version.
//! All three exercise shapes (single-language, dual-file, project) share the
//! same record: a map of slots, each holding the user's `code`, the starter
//! `baseline` it diverged from, and a timestamp. The shape only decides which
//! slots exist and how they are seeded, see [`Starters`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DraftError;

/// Format tag written into every bundle record
pub const BUNDLE_FORMAT: &str = "2";

/// Slot name of the markup file in dual-file bundles
pub const MARKUP_SLOT: &str = "html";
/// Slot name of the styling file in dual-file bundles
pub const STYLE_SLOT: &str = "css";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SlotRecord {
    /// Code if the user has typed anything, whitespace included
    fn authored_code(&self) -> Option<&str> {
        self.code.as_deref().filter(|code| !code.is_empty())
    }

    /// What the editor should show: the saved code, else the baseline
    #[must_use]
    pub fn visible(&self) -> &str {
        match self.code.as_deref() {
            Some(code) if !code.is_empty() => code,
            _ => self.baseline.as_deref().unwrap_or(""),
        }
    }

    /// Non-empty code whose trimmed text differs from the trimmed baseline
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        match self.code.as_deref() {
            Some(code) if !code.is_empty() => {
                code.trim() != self.baseline.as_deref().unwrap_or("").trim()
            }
            _ => false,
        }
    }

    /// Decide whether an ordinary (non-forced) save of `value` may land.
    ///
    /// # Errors
    ///
    /// Returns the guard that refused the write.
    pub fn check_save(&self, value: &str) -> Result<(), GuardRejection> {
        if self.authored_code().is_none() {
            return Ok(());
        }
        if value.trim().is_empty() {
            return Err(GuardRejection::EmptyOverCode);
        }
        if self.baseline.as_deref() == Some(value) {
            return Err(GuardRejection::BaselineOverCode);
        }
        Ok(())
    }
}

/// Why a save was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    /// A blank value would wipe saved code
    EmptyOverCode,
    /// A stale baseline would mask a real edit
    BaselineOverCode,
}

/// Read-only view of one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotState {
    pub code: String,
    pub baseline: String,
    pub dirty: bool,
}

impl From<&SlotRecord> for SlotState {
    fn from(slot: &SlotRecord) -> Self {
        Self {
            code: slot.code.clone().unwrap_or_default(),
            baseline: slot.baseline.clone().unwrap_or_default(),
            dirty: slot.is_dirty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRecord {
    pub slots: BTreeMap<String, SlotRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_lang: Option<String>,
    pub version: String,
    pub updated_at: DateTime<Utc>,
}

impl BundleRecord {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
            entry_file: None,
            last_lang: None,
            version: BUNDLE_FORMAT.to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Parse a stored record; anything that is not a current-format bundle
    /// is treated as absent.
    #[must_use]
    pub fn decode(data: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(data)
            .ok()
            .filter(|bundle| bundle.version == BUNDLE_FORMAT)
    }

    /// # Errors
    ///
    /// Fails if the record cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>, DraftError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Seed every starter slot that has no baseline yet.
    ///
    /// Never touches `code`. Also fills `lastLang` and `entryFile` from the
    /// starters when they are unset. Returns whether anything changed.
    pub fn seed(&mut self, starters: &Starters) -> bool {
        let mut changed = false;
        for (name, starter) in starters.slots() {
            let slot = self.slots.entry(name.to_string()).or_default();
            if slot.baseline.is_none() {
                slot.baseline = Some(starter.to_string());
                changed = true;
            }
        }
        if self.last_lang.is_none() {
            if let Some(lang) = starters.default_lang() {
                self.last_lang = Some(lang.to_string());
                changed = true;
            }
        }
        if self.entry_file.is_none() {
            if let Some(entry) = starters.entry_file() {
                self.entry_file = Some(entry.to_string());
                changed = true;
            }
        }
        changed
    }

    /// Overwrite a slot's code and bump timestamps
    pub fn write_code(&mut self, slot: &str, value: &str, now: DateTime<Utc>) {
        let record = self.slots.entry(slot.to_string()).or_default();
        record.code = Some(value.to_string());
        record.updated_at = Some(now);
        self.updated_at = now;
    }

    /// Replace the whole bundle content with the starters
    pub fn reset(&mut self, starters: &Starters, now: DateTime<Utc>) {
        self.slots = starters
            .slots()
            .into_iter()
            .map(|(name, starter)| {
                let slot = SlotRecord {
                    code: Some(starter.to_string()),
                    baseline: Some(starter.to_string()),
                    updated_at: Some(now),
                };
                (name.to_string(), slot)
            })
            .collect();
        if let Some(entry) = starters.entry_file() {
            self.entry_file = Some(entry.to_string());
        }
        if self.last_lang.is_none() {
            self.last_lang = starters.default_lang().map(str::to_string);
        }
        self.updated_at = now;
    }

    /// Per-slot visible content and restored flags
    #[must_use]
    pub fn view(&self) -> InitOutcome {
        let slots: BTreeMap<String, SlotView> = self
            .slots
            .iter()
            .map(|(name, slot)| {
                let view = SlotView {
                    visible: slot.visible().to_string(),
                    restored: slot.is_dirty(),
                };
                (name.clone(), view)
            })
            .collect();
        InitOutcome {
            restored: slots.values().any(|slot| slot.restored),
            slots,
            last_lang: self.last_lang.clone(),
            entry_file: self.entry_file.clone(),
        }
    }
}

impl Default for BundleRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-versioning record: plain code per slot, no baselines
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRecord {
    code: BTreeMap<String, String>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl BundleRecord {
    /// Parse either a current bundle or a flat legacy record
    #[must_use]
    pub fn decode_any(data: &[u8]) -> Option<Self> {
        if let Some(bundle) = Self::decode(data) {
            return Some(bundle);
        }
        let legacy: LegacyRecord = serde_json::from_slice(data).ok()?;
        let updated_at = legacy.updated_at.unwrap_or_else(Utc::now);
        let slots = legacy
            .code
            .into_iter()
            .map(|(name, code)| {
                let slot = SlotRecord {
                    code: Some(code),
                    baseline: None,
                    updated_at: Some(updated_at),
                };
                (name, slot)
            })
            .collect();
        Some(Self {
            slots,
            entry_file: None,
            last_lang: legacy.lang,
            version: BUNDLE_FORMAT.to_string(),
            updated_at,
        })
    }
}

/// Starter content for a bundle, tagged by exercise shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Starters {
    /// One slot per language, in declaration order
    SingleLanguage(Vec<(String, String)>),
    /// Fixed markup and styling slots
    DualFile { markup: String, style: String },
    /// Relative path to file content, plus the file opened first
    Project {
        files: BTreeMap<String, String>,
        entry_file: String,
    },
}

impl Starters {
    /// Slot names with their starter text
    #[must_use]
    pub fn slots(&self) -> Vec<(&str, &str)> {
        match self {
            Self::SingleLanguage(langs) => langs
                .iter()
                .map(|(lang, starter)| (lang.as_str(), starter.as_str()))
                .collect(),
            Self::DualFile { markup, style } => {
                vec![(MARKUP_SLOT, markup.as_str()), (STYLE_SLOT, style.as_str())]
            }
            Self::Project { files, .. } => files
                .iter()
                .map(|(path, content)| (path.as_str(), content.as_str()))
                .collect(),
        }
    }

    #[must_use]
    pub fn default_lang(&self) -> Option<&str> {
        match self {
            Self::SingleLanguage(langs) => langs.first().map(|(lang, _)| lang.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn entry_file(&self) -> Option<&str> {
        match self {
            Self::Project { entry_file, .. } => Some(entry_file.as_str()),
            _ => None,
        }
    }
}

/// What the editor shows for one slot after init
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub visible: String,
    pub restored: bool,
}

/// Result of initializing (or opening) a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub slots: BTreeMap<String, SlotView>,
    /// Any slot holds a saved edit that differs from its starter
    pub restored: bool,
    pub last_lang: Option<String>,
    pub entry_file: Option<String>,
}

impl InitOutcome {
    /// Visible content of one slot
    #[must_use]
    pub fn visible(&self, slot: &str) -> Option<&str> {
        self.slots.get(slot).map(|view| view.visible.as_str())
    }

    /// Outcome shown when nothing could be loaded or stored
    #[must_use]
    pub fn from_starters(starters: &Starters) -> Self {
        let mut bundle = BundleRecord::new();
        bundle.seed(starters);
        bundle.view()
    }
}
