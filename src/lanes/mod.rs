//! The three on-disk lanes.
//!
//! Each lane directory holds one `<skill_id>/` slot per bundle plus the
//! hidden `.staging/` and `.trash/` work areas used for atomic replacement.

pub mod lock;
pub mod manager;
pub mod placeholder;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::policy::Disposition;

pub use lock::{RunLock, SkillLocks};
pub use manager::LaneManager;

pub const STAGING_DIR: &str = ".staging";
pub const TRASH_DIR: &str = ".trash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Active,
    Inactive,
    Quarantine,
}

impl Lane {
    pub const ALL: [Self; 3] = [Self::Active, Self::Inactive, Self::Quarantine];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Quarantine => "quarantine",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a skill's real content lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneState {
    Active,
    Inactive,
    Quarantine,
    Absent,
}

impl From<Lane> for LaneState {
    fn from(lane: Lane) -> Self {
        match lane {
            Lane::Active => Self::Active,
            Lane::Inactive => Self::Inactive,
            Lane::Quarantine => Self::Quarantine,
        }
    }
}

impl std::fmt::Display for LaneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Inactive => f.write_str("inactive"),
            Self::Quarantine => f.write_str("quarantine"),
            Self::Absent => f.write_str("absent"),
        }
    }
}

/// Lane directory paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneLayout {
    pub active: PathBuf,
    pub inactive: PathBuf,
    pub quarantine: PathBuf,
}

impl LaneLayout {
    #[must_use]
    pub const fn new(active: PathBuf, inactive: PathBuf, quarantine: PathBuf) -> Self {
        Self {
            active,
            inactive,
            quarantine,
        }
    }

    #[must_use]
    pub fn path(&self, lane: Lane) -> &Path {
        match lane {
            Lane::Active => &self.active,
            Lane::Inactive => &self.inactive,
            Lane::Quarantine => &self.quarantine,
        }
    }

    #[must_use]
    pub fn all(&self) -> [(Lane, &Path); 3] {
        Lane::ALL.map(|lane| (lane, self.path(lane)))
    }

    #[must_use]
    pub fn slot(&self, lane: Lane, skill_id: &str) -> PathBuf {
        self.path(lane).join(skill_id)
    }

    #[must_use]
    pub fn staging_dir(&self, lane: Lane) -> PathBuf {
        self.path(lane).join(STAGING_DIR)
    }

    #[must_use]
    pub fn trash_dir(&self, lane: Lane) -> PathBuf {
        self.path(lane).join(TRASH_DIR)
    }

    /// Skill ids with a slot in `lane`, sorted. Hidden entries are skipped.
    pub fn list(&self, lane: Lane) -> std::io::Result<Vec<String>> {
        let dir = self.path(lane);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                ids.push(name);
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// What occupies the active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActiveSlot {
    #[default]
    Empty,
    Content,
    Placeholder,
}

/// Observed occupancy of one skill id across the lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Placement {
    pub active: ActiveSlot,
    pub inactive: bool,
    pub quarantine: bool,
}

impl Placement {
    #[must_use]
    pub fn observe(layout: &LaneLayout, skill_id: &str) -> Self {
        let active_slot = layout.slot(Lane::Active, skill_id);
        let active = if !slot_exists(&active_slot) {
            ActiveSlot::Empty
        } else if placeholder::is_placeholder(&active_slot) {
            ActiveSlot::Placeholder
        } else {
            ActiveSlot::Content
        };
        Self {
            active,
            inactive: slot_exists(&layout.slot(Lane::Inactive, skill_id)),
            quarantine: slot_exists(&layout.slot(Lane::Quarantine, skill_id)),
        }
    }

    /// Lanes currently holding real content.
    #[must_use]
    pub fn content_lanes(&self) -> Vec<Lane> {
        let mut lanes = Vec::new();
        if self.active == ActiveSlot::Content {
            lanes.push(Lane::Active);
        }
        if self.inactive {
            lanes.push(Lane::Inactive);
        }
        if self.quarantine {
            lanes.push(Lane::Quarantine);
        }
        lanes
    }

    /// Real content location. Picks the most restrictive lane when several hold content.
    #[must_use]
    pub fn lane_state(&self) -> LaneState {
        self.content_lanes()
            .into_iter()
            .max()
            .map_or(LaneState::Absent, LaneState::from)
    }

    /// True when the lanes already reflect `disposition` exactly.
    #[must_use]
    pub fn matches(&self, disposition: Disposition) -> bool {
        let expected = match disposition {
            Disposition::Active => Self {
                active: ActiveSlot::Content,
                inactive: false,
                quarantine: false,
            },
            Disposition::PlaceholderInactive => Self {
                active: ActiveSlot::Placeholder,
                inactive: true,
                quarantine: false,
            },
            Disposition::Inactive => Self {
                active: ActiveSlot::Empty,
                inactive: true,
                quarantine: false,
            },
            Disposition::Quarantine => Self {
                active: ActiveSlot::Empty,
                inactive: false,
                quarantine: true,
            },
            Disposition::PlaceholderQuarantine => Self {
                active: ActiveSlot::Placeholder,
                inactive: false,
                quarantine: true,
            },
        };
        *self == expected
    }

    /// The disposition these lanes represent, if any.
    #[must_use]
    pub fn disposition(&self) -> Option<Disposition> {
        Disposition::ALL.into_iter().find(|d| self.matches(*d))
    }
}

/// True for any directory entry at `path`, including dangling symlinks.
pub(crate) fn slot_exists(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}
