//! Manual `activate` / `deactivate` transitions.
//!
//! Both take the run lock once per command, go through the same lane manager
//! as a sync and mark the stored record `manual` so later syncs of the same
//! content keep the placement.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::state::{SyncRecord, SyncState, SyncStateStore};
use crate::config::RunConfig;
use crate::core::bundle::{SkillBundle, validate_skill_id};
use crate::core::policy::{DecisionReason, Disposition, PolicyAction, PolicyLists};
use crate::core::verdict::{OverallSeverity, Verdict};
use crate::error::{Result, VetError};
use crate::lanes::{ActiveSlot, Lane, LaneManager, LaneState, RunLock};
use crate::security::scanner::Scanner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualAction {
    Activate,
    Deactivate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManualOptions {
    /// Skip the activation safety gate.
    pub force: bool,
    /// Let warning-level skills through the activation gate.
    pub allow_warnings: bool,
    pub dry_run: bool,
}

/// Result of a manual transition.
#[derive(Debug, Clone, Serialize)]
pub struct ManualOutcome {
    pub skill_id: String,
    pub action: ManualAction,
    pub from: LaneState,
    pub to: LaneState,
    /// Severity of the lane content, rescanned now.
    pub severity: OverallSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_severity: Option<OverallSeverity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_ids: Vec<String>,
    /// Reasons the safety gate would have refused; only set when forced.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub overridden: Vec<String>,
    pub forced: bool,
    pub dry_run: bool,
    /// False for dry runs and when the lanes already matched.
    pub applied: bool,
}

#[derive(Debug)]
pub struct ManualFailure {
    pub skill_id: String,
    pub error: VetError,
}

/// Per-skill results of one manual command.
#[derive(Debug, Default)]
pub struct ManualBatch {
    pub outcomes: Vec<ManualOutcome>,
    pub failures: Vec<ManualFailure>,
}

impl ManualBatch {
    /// Outcomes, or the first failure if any skill failed.
    pub fn into_result(self) -> Result<Vec<ManualOutcome>> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure.error),
            None => Ok(self.outcomes),
        }
    }
}

/// Run `action` for every id under a single run lock.
///
/// Ids are validated before anything is locked or moved; a bad id fails the
/// whole batch. After that each skill succeeds or fails on its own and state
/// is saved once at the end.
pub fn run_batch(
    run: &RunConfig,
    action: ManualAction,
    skill_ids: &[String],
    options: ManualOptions,
) -> Result<ManualBatch> {
    let mut ids: Vec<&str> = Vec::with_capacity(skill_ids.len());
    for id in skill_ids {
        validate_skill_id(id)?;
        if !ids.contains(&id.as_str()) {
            ids.push(id.as_str());
        }
    }

    let _lock = if options.dry_run {
        None
    } else {
        Some(RunLock::try_acquire(&run.audit_dir)?)
    };
    let lists = match action {
        ManualAction::Activate => {
            PolicyLists::load(run.allowlist_path.as_deref(), run.denylist_path.as_deref())?
        }
        ManualAction::Deactivate => PolicyLists::default(),
    };
    let store = SyncStateStore::new(&run.state_path);
    let (state, _) = store.load();
    let mut session = Session {
        run,
        lanes: LaneManager::new(run.layout.clone(), run.backup_root.clone()),
        lists,
        state,
        options,
        dirty: false,
    };

    let mut batch = ManualBatch::default();
    for id in ids {
        let result = match action {
            ManualAction::Activate => session.activate(id),
            ManualAction::Deactivate => session.deactivate(id),
        };
        match result {
            Ok(outcome) => batch.outcomes.push(outcome),
            Err(error) => {
                warn!(skill_id = id, error = %error, "manual transition failed");
                batch.failures.push(ManualFailure {
                    skill_id: id.to_string(),
                    error,
                });
            }
        }
    }

    if session.dirty {
        store.save(&session.state)?;
    }
    Ok(batch)
}

/// Promote a skill from inactive (or quarantine) into the active lane.
pub fn activate(run: &RunConfig, skill_id: &str, options: ManualOptions) -> Result<ManualOutcome> {
    single(run_batch(run, ManualAction::Activate, &[skill_id.to_string()], options)?, skill_id)
}

/// Move a skill's active content (or placeholder) out of the active lane.
pub fn deactivate(run: &RunConfig, skill_id: &str, options: ManualOptions) -> Result<ManualOutcome> {
    single(run_batch(run, ManualAction::Deactivate, &[skill_id.to_string()], options)?, skill_id)
}

fn single(batch: ManualBatch, skill_id: &str) -> Result<ManualOutcome> {
    batch
        .into_result()?
        .into_iter()
        .next()
        .ok_or_else(|| VetError::SkillNotFound(skill_id.to_string()))
}

struct Session<'a> {
    run: &'a RunConfig,
    lanes: LaneManager,
    lists: PolicyLists,
    state: SyncState,
    options: ManualOptions,
    dirty: bool,
}

impl Session<'_> {
    fn activate(&mut self, skill_id: &str) -> Result<ManualOutcome> {
        let placement = self.lanes.placement(skill_id);
        let from = if placement.inactive {
            Lane::Inactive
        } else if placement.quarantine {
            Lane::Quarantine
        } else if placement.active == ActiveSlot::Content {
            Lane::Active
        } else {
            return Err(VetError::SkillNotFound(skill_id.to_string()));
        };

        let bundle = self.read(from, skill_id);
        let verdict = Verdict::from_outcome(skill_id, Scanner::builtin().scan(&bundle));
        let recorded = self.state.skills.get(skill_id).cloned();

        let mut outcome = ManualOutcome {
            skill_id: skill_id.to_string(),
            action: ManualAction::Activate,
            from: from.into(),
            to: LaneState::Active,
            severity: verdict.overall_severity,
            recorded_severity: recorded.as_ref().map(|r| r.overall_severity),
            rule_ids: verdict.rule_ids(),
            overridden: Vec::new(),
            forced: self.options.force,
            dry_run: self.options.dry_run,
            applied: false,
        };

        if placement.matches(Disposition::Active) {
            info!(skill_id, "already active");
            return Ok(outcome);
        }

        let blockers = activation_blockers(
            skill_id,
            recorded.as_ref(),
            &verdict,
            &self.lists,
            self.options.allow_warnings,
        );
        if !blockers.is_empty() {
            if !self.options.force {
                return Err(VetError::ActivationBlocked {
                    skill_id: skill_id.to_string(),
                    reason: blockers.join("; "),
                });
            }
            warn!(skill_id, reasons = %blockers.join("; "), "forcing activation past the safety gate");
            outcome.overridden = blockers;
        }

        if self.options.dry_run {
            return Ok(outcome);
        }

        self.lanes.ensure_layout()?;
        self.lanes.apply(skill_id, &bundle.members, Disposition::Active, &[])?;
        self.record(skill_id, &bundle, &verdict, recorded, Disposition::Active);

        info!(skill_id, from = %from, forced = self.options.force, "activated skill");
        outcome.applied = true;
        Ok(outcome)
    }

    fn deactivate(&mut self, skill_id: &str) -> Result<ManualOutcome> {
        let placement = self.lanes.placement(skill_id);
        let content_lane = match placement.active {
            ActiveSlot::Content => Lane::Active,
            ActiveSlot::Placeholder | ActiveSlot::Empty if placement.inactive => Lane::Inactive,
            ActiveSlot::Placeholder | ActiveSlot::Empty => {
                return Err(VetError::SkillNotFound(skill_id.to_string()));
            }
        };

        let bundle = self.read(content_lane, skill_id);
        let verdict = Verdict::from_outcome(skill_id, Scanner::builtin().scan(&bundle));
        let recorded = self.state.skills.get(skill_id).cloned();

        let mut outcome = ManualOutcome {
            skill_id: skill_id.to_string(),
            action: ManualAction::Deactivate,
            from: content_lane.into(),
            to: LaneState::Inactive,
            severity: verdict.overall_severity,
            recorded_severity: recorded.as_ref().map(|r| r.overall_severity),
            rule_ids: verdict.rule_ids(),
            overridden: Vec::new(),
            forced: self.options.force,
            dry_run: self.options.dry_run,
            applied: false,
        };

        if placement.matches(Disposition::Inactive) {
            info!(skill_id, "already inactive");
            return Ok(outcome);
        }
        if self.options.dry_run {
            return Ok(outcome);
        }

        self.lanes.ensure_layout()?;
        self.lanes.apply(skill_id, &bundle.members, Disposition::Inactive, &[])?;
        self.record(skill_id, &bundle, &verdict, recorded, Disposition::Inactive);

        info!(skill_id, from = %content_lane, "deactivated skill");
        outcome.applied = true;
        Ok(outcome)
    }

    fn read(&self, lane: Lane, skill_id: &str) -> SkillBundle {
        SkillBundle::read(
            &self.lanes.layout().slot(lane, skill_id),
            skill_id,
            self.run.max_file_bytes,
        )
    }

    /// Keeps the recorded source hash so the next sync sees unchanged content.
    fn record(
        &mut self,
        skill_id: &str,
        bundle: &SkillBundle,
        verdict: &Verdict,
        recorded: Option<SyncRecord>,
        disposition: Disposition,
    ) {
        let record = SyncRecord {
            skill_id: skill_id.to_string(),
            content_hash: recorded.map_or_else(|| bundle.content_hash.clone(), |r| r.content_hash),
            overall_severity: verdict.overall_severity,
            lane: disposition.content_lane().into(),
            disposition,
            reason: DecisionReason::Manual,
            manual: true,
            rule_ids: verdict.rule_ids(),
            timestamp: Utc::now(),
        };
        self.state.skills.insert(skill_id.to_string(), record);
        self.dirty = true;
    }
}

/// Reasons a skill may not be activated without `--force`. Empty means allowed.
fn activation_blockers(
    skill_id: &str,
    recorded: Option<&SyncRecord>,
    verdict: &Verdict,
    lists: &PolicyLists,
    allow_warnings: bool,
) -> Vec<String> {
    let passes = |severity: OverallSeverity| {
        severity == OverallSeverity::Clean || (allow_warnings && severity == OverallSeverity::Warning)
    };
    let mut reasons = Vec::new();
    match recorded {
        None => reasons.push("no sync record; run weekly-sync first".to_string()),
        Some(record) if !passes(record.overall_severity) => reasons.push(format!(
            "last recorded severity is {}",
            record.overall_severity
        )),
        Some(_) => {}
    }
    if !passes(verdict.overall_severity) {
        reasons.push(format!("rescan severity is {}", verdict.overall_severity));
    }
    if lists.is_denied(skill_id) {
        reasons.push("skill is denylisted".to_string());
    } else if lists.action(skill_id) == PolicyAction::Deny {
        reasons.push("skill is not in the allowlist".to_string());
    }
    reasons
}
