//! Persisted sync state.
//!
//! One JSON file per audit directory maps each skill id to the last recorded
//! hash, severity and placement. Loading never fails: a missing, unreadable or
//! foreign-version file yields empty state and every bundle counts as new.
//! Saves go through a temp file and rename.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::policy::{DecisionReason, Disposition};
use crate::core::verdict::OverallSeverity;
use crate::error::{Result, VetError};
use crate::lanes::LaneState;
use crate::utils::fs::atomic_write;

pub const STATE_VERSION: u32 = 1;

/// Last known outcome for one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub skill_id: String,
    pub content_hash: String,
    pub overall_severity: OverallSeverity,
    pub lane: LaneState,
    pub disposition: Disposition,
    pub reason: DecisionReason,
    /// Placed by `activate`/`deactivate` rather than by a sync.
    #[serde(default)]
    pub manual: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_ids: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub version: u32,
    #[serde(default)]
    pub skills: BTreeMap<String, SyncRecord>,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            skills: BTreeMap::new(),
            last_run: None,
        }
    }
}

/// How a bundle relates to its stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleChange {
    New,
    Changed,
    Unchanged,
}

impl SyncState {
    #[must_use]
    pub fn change_for(&self, skill_id: &str, content_hash: &str) -> BundleChange {
        match self.skills.get(skill_id) {
            None => BundleChange::New,
            Some(record) if record.content_hash == content_hash => BundleChange::Unchanged,
            Some(_) => BundleChange::Changed,
        }
    }

    /// Recorded ids missing from `present`, sorted.
    #[must_use]
    pub fn stale_ids(&self, present: &BTreeSet<&str>) -> Vec<String> {
        self.skills
            .keys()
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect()
    }
}

/// Where the in-memory state came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StateOrigin {
    Loaded,
    Missing,
    /// The file existed but could not be used; every bundle counts as new.
    Recovered { reason: String },
}

/// JSON state file, written atomically.
#[derive(Debug, Clone)]
pub struct SyncStateStore {
    path: PathBuf,
}

impl SyncStateStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state. Never fails: a missing or unusable file yields empty state.
    #[must_use]
    pub fn load(&self) -> (SyncState, StateOrigin) {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return (SyncState::default(), StateOrigin::Missing);
            }
            Err(err) => return recovered(&self.path, format!("read failed: {err}")),
        };

        match serde_json::from_str::<SyncState>(&raw) {
            Ok(state) if state.version == STATE_VERSION => (state, StateOrigin::Loaded),
            Ok(state) => recovered(
                &self.path,
                format!("unsupported state version {}", state.version),
            ),
            Err(err) => recovered(&self.path, format!("parse failed: {err}")),
        }
    }

    pub fn save(&self, state: &SyncState) -> Result<()> {
        let rendered = serde_json::to_string_pretty(state)?;
        atomic_write(&self.path, rendered.as_bytes()).map_err(|err| {
            VetError::StateStore(format!("write {}: {err}", self.path.display()))
        })
    }
}

fn recovered(path: &Path, reason: String) -> (SyncState, StateOrigin) {
    warn!(path = %path.display(), reason = %reason, "sync state unusable; running a full rescan");
    (SyncState::default(), StateOrigin::Recovered { reason })
}
