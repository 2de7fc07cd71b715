//! Allow/deny policy and the final disposition of a bundle.
//!
//! Precedence, highest first:
//! 1. denylisted ids are quarantined
//! 2. with a non-empty allowlist, ids absent from it are quarantined
//! 3. otherwise the scan severity decides

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::verdict::OverallSeverity;
use crate::error::{Result, VetError};
use crate::lanes::Lane;

/// Parsed allow and deny lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyLists {
    allow: BTreeSet<String>,
    deny: BTreeSet<String>,
}

impl PolicyLists {
    pub fn new<A, D>(allow: A, deny: D) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            allow: allow.into_iter().map(Into::into).collect(),
            deny: deny.into_iter().map(Into::into).collect(),
        }
    }

    /// Load both lists. A missing file is an empty list.
    pub fn load(allowlist: Option<&Path>, denylist: Option<&Path>) -> Result<Self> {
        let lists = Self {
            allow: load_list(allowlist)?,
            deny: load_list(denylist)?,
        };
        for id in lists.conflicts() {
            warn!(skill_id = %id, "skill is in both allowlist and denylist; denylist wins");
        }
        Ok(lists)
    }

    #[must_use]
    pub const fn allow(&self) -> &BTreeSet<String> {
        &self.allow
    }

    #[must_use]
    pub const fn deny(&self) -> &BTreeSet<String> {
        &self.deny
    }

    #[must_use]
    pub fn is_denied(&self, skill_id: &str) -> bool {
        self.deny.contains(skill_id)
    }

    #[must_use]
    pub fn allowlist_active(&self) -> bool {
        !self.allow.is_empty()
    }

    /// Policy action from list membership alone.
    #[must_use]
    pub fn action(&self, skill_id: &str) -> PolicyAction {
        if self.deny.contains(skill_id) {
            PolicyAction::Deny
        } else if self.allow.contains(skill_id) {
            PolicyAction::Allow
        } else if self.allowlist_active() {
            PolicyAction::Deny
        } else {
            PolicyAction::Default
        }
    }

    /// Ids present in both lists, sorted.
    #[must_use]
    pub fn conflicts(&self) -> Vec<String> {
        self.allow.intersection(&self.deny).cloned().collect()
    }
}

/// One id per line; blank lines and `#` comments ignored.
#[must_use]
pub fn parse_list(text: &str) -> BTreeSet<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn load_list(path: Option<&Path>) -> Result<BTreeSet<String>> {
    let Some(path) = path else {
        return Ok(BTreeSet::new());
    };
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_list(&text)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "policy list not found; treating as empty");
            Ok(BTreeSet::new())
        }
        Err(err) => Err(VetError::Config(format!(
            "read policy list {}: {err}",
            path.display()
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Allow,
    Deny,
    Default,
}

/// Where a bundle's real content should end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Active,
    /// Real content in inactive, placeholder in active.
    PlaceholderInactive,
    /// Real content in inactive, active slot empty.
    Inactive,
    Quarantine,
    /// Real content in quarantine, placeholder in active.
    PlaceholderQuarantine,
}

impl Disposition {
    pub const ALL: [Self; 5] = [
        Self::Active,
        Self::PlaceholderInactive,
        Self::Inactive,
        Self::Quarantine,
        Self::PlaceholderQuarantine,
    ];

    /// Lane holding the real content.
    #[must_use]
    pub const fn content_lane(self) -> Lane {
        match self {
            Self::Active => Lane::Active,
            Self::PlaceholderInactive | Self::Inactive => Lane::Inactive,
            Self::Quarantine | Self::PlaceholderQuarantine => Lane::Quarantine,
        }
    }

    #[must_use]
    pub const fn has_placeholder(self) -> bool {
        matches!(self, Self::PlaceholderInactive | Self::PlaceholderQuarantine)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PlaceholderInactive => "placeholder_inactive",
            Self::Inactive => "inactive",
            Self::Quarantine => "quarantine",
            Self::PlaceholderQuarantine => "placeholder_quarantine",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Clean,
    WarningsAllowed,
    Warning,
    Danger,
    ScanError,
    Denylisted,
    NotAllowlisted,
    /// A manual activate or deactivate placed the bundle.
    Manual,
}

/// Run-level switches that affect the decision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecideOptions {
    pub allow_warnings: bool,
    pub suppress_placeholder: bool,
    /// Danger bundles also get a placeholder in active.
    pub placeholder_danger: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub skill_id: String,
    pub action: PolicyAction,
    pub disposition: Disposition,
    pub reason: DecisionReason,
}

/// Final disposition for one bundle.
#[must_use]
pub fn decide(
    skill_id: &str,
    severity: OverallSeverity,
    lists: &PolicyLists,
    options: DecideOptions,
) -> Decision {
    let action = lists.action(skill_id);
    let (disposition, reason) = if lists.is_denied(skill_id) {
        (Disposition::Quarantine, DecisionReason::Denylisted)
    } else if action == PolicyAction::Deny {
        (Disposition::Quarantine, DecisionReason::NotAllowlisted)
    } else {
        match severity {
            OverallSeverity::Clean => (Disposition::Active, DecisionReason::Clean),
            OverallSeverity::Warning if options.allow_warnings => {
                (Disposition::Active, DecisionReason::WarningsAllowed)
            }
            OverallSeverity::Warning if options.suppress_placeholder => {
                (Disposition::Inactive, DecisionReason::Warning)
            }
            OverallSeverity::Warning => (Disposition::PlaceholderInactive, DecisionReason::Warning),
            OverallSeverity::Danger if options.placeholder_danger => {
                (Disposition::PlaceholderQuarantine, DecisionReason::Danger)
            }
            OverallSeverity::Danger => (Disposition::Quarantine, DecisionReason::Danger),
            OverallSeverity::Error => (Disposition::Quarantine, DecisionReason::ScanError),
        }
    };

    Decision {
        skill_id: skill_id.to_string(),
        action,
        disposition,
        reason,
    }
}
