//! Sync orchestration.
//!
//! A run reads every bundle once, then scans, classifies and decides on a
//! bounded rayon pool. Lane transitions for distinct skills also run on the
//! pool; the lane manager serializes work per skill id. Results are collected
//! in skill-id order so reports never depend on completion order.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::state::{BundleChange, StateOrigin, SyncRecord, SyncState, SyncStateStore};
use crate::config::RunConfig;
use crate::core::bundle::{IgnoredEntry, SkillBundle, discover};
use crate::core::policy::{DecideOptions, Decision, PolicyLists, decide};
use crate::core::verdict::Verdict;
use crate::error::{Result, VetError};
use crate::lanes::{Lane, LaneLayout, LaneManager, LaneState, RunLock};
use crate::report::{RunReport, write_artifacts};
use crate::security::scanner::Scanner;

/// What happened in the lanes for one bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneOperation {
    Applied,
    /// Lanes already matched; nothing was touched.
    Unchanged,
    /// A manual placement was kept.
    Retained,
    /// Dry run; nothing was touched.
    Planned,
    Failed,
}

impl LaneOperation {
    pub const ALL: [Self; 5] = [
        Self::Applied,
        Self::Unchanged,
        Self::Retained,
        Self::Planned,
        Self::Failed,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Unchanged => "unchanged",
            Self::Retained => "retained",
            Self::Planned => "planned",
            Self::Failed => "failed",
        }
    }
}

/// Full result for one processed bundle.
#[derive(Debug, Clone, Serialize)]
pub struct BundleOutcome {
    pub skill_id: String,
    pub change: BundleChange,
    pub content_hash: String,
    pub verdict: Verdict,
    pub decision: Decision,
    pub operation: LaneOperation,
    /// Lane holding the real content after the run (planned lane in dry runs).
    pub lane: LaneState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BundleOutcome {
    /// Content went to quarantine (or would, in a dry run).
    #[must_use]
    pub fn contained(&self) -> bool {
        self.decision.disposition.content_lane() == Lane::Quarantine
            && matches!(
                self.operation,
                LaneOperation::Applied | LaneOperation::Unchanged | LaneOperation::Planned
            )
    }
}

/// Result of a weekly sync run.
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub dry_run: bool,
    pub new_only: bool,
    pub source: PathBuf,
    pub layout: LaneLayout,
    pub workers: usize,
    pub state_origin: StateOrigin,
    pub discovered: usize,
    /// Sorted by skill id.
    pub outcomes: Vec<BundleOutcome>,
    /// Unchanged bundles not processed in new-only mode.
    pub skipped_unchanged: Vec<String>,
    pub ignored: Vec<IgnoredEntry>,
    pub stale: Vec<String>,
    pub policy_conflicts: Vec<String>,
    pub swept: usize,
}

/// Result of a one-shot scan.
#[derive(Debug, Clone)]
pub struct ScanRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub source: PathBuf,
    pub workers: usize,
    pub discovered: usize,
    /// Sorted by skill id, with each bundle's content hash.
    pub verdicts: Vec<(Verdict, String)>,
    pub ignored: Vec<IgnoredEntry>,
}

struct Evaluated {
    bundle: SkillBundle,
    change: BundleChange,
    judged: Option<(Verdict, Decision)>,
}

pub struct SyncEngine {
    run: RunConfig,
    scanner: Scanner<'static>,
}

impl SyncEngine {
    #[must_use]
    pub fn new(run: RunConfig) -> Self {
        Self {
            run,
            scanner: Scanner::builtin(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.run
    }

    /// Run the sync and write the report and verdict.
    pub fn execute(&self) -> Result<RunReport> {
        let run = self.run()?;
        let report = RunReport::from_sync(&run, self.run.top_rules);
        write_artifacts(&report, &self.run.report_path(), &self.run.verdict_path())?;
        Ok(report)
    }

    /// Full pipeline: discover, evaluate, move, persist.
    pub fn run(&self) -> Result<SyncRun> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let cfg = &self.run;

        cfg.validate()?;
        let lists = PolicyLists::load(cfg.allowlist_path.as_deref(), cfg.denylist_path.as_deref())?;
        let discovery = discover(&cfg.source)?;
        let lanes = LaneManager::new(cfg.layout.clone(), cfg.backup_root.clone());

        let (_lock, swept) = if cfg.dry_run {
            (None, 0)
        } else {
            let lock = RunLock::try_acquire(&cfg.audit_dir)?;
            lanes.ensure_layout()?;
            let swept = lanes.sweep()?;
            (Some(lock), swept)
        };

        let store = SyncStateStore::new(&cfg.state_path);
        let (mut state, state_origin) = store.load();

        let pool = self.pool()?;
        let options = DecideOptions {
            allow_warnings: cfg.allow_warnings,
            suppress_placeholder: cfg.suppress_placeholder_warnings,
            placeholder_danger: cfg.placeholder_danger,
        };

        let evaluated: Vec<Evaluated> = pool.install(|| {
            discovery
                .ids
                .par_iter()
                .map(|id| self.evaluate(id, &state, &lists, options))
                .collect()
        });

        let mut skipped_unchanged = Vec::new();
        let mut pending = Vec::new();
        for item in evaluated {
            match item.judged {
                Some((verdict, decision)) => pending.push((item.bundle, item.change, verdict, decision)),
                None => skipped_unchanged.push(item.bundle.id),
            }
        }

        let settled: Vec<(BundleOutcome, Option<SyncRecord>)> = pool.install(|| {
            pending
                .into_par_iter()
                .map(|(bundle, change, verdict, decision)| {
                    let previous = state.skills.get(&bundle.id);
                    self.settle(&lanes, bundle, change, verdict, decision, previous)
                })
                .collect()
        });

        let mut outcomes = Vec::with_capacity(settled.len());
        for (outcome, record) in settled {
            if let Some(record) = record {
                state.skills.insert(record.skill_id.clone(), record);
            }
            outcomes.push(outcome);
        }

        let present: BTreeSet<&str> = discovery.ids.iter().map(String::as_str).collect();
        let stale = state.stale_ids(&present);
        if !stale.is_empty() {
            debug!(count = stale.len(), "state holds records for bundles no longer in source");
        }

        if !cfg.dry_run {
            state.last_run = Some(Utc::now());
            store.save(&state)?;
        }

        let run = SyncRun {
            started_at,
            finished_at: Utc::now(),
            duration_ms: timer.elapsed().as_millis(),
            dry_run: cfg.dry_run,
            new_only: cfg.new_only,
            source: cfg.source.clone(),
            layout: cfg.layout.clone(),
            workers: cfg.worker_count(),
            state_origin,
            discovered: discovery.ids.len(),
            outcomes,
            skipped_unchanged,
            ignored: discovery.ignored,
            stale,
            policy_conflicts: lists.conflicts(),
            swept,
        };

        info!(
            discovered = run.discovered,
            processed = run.outcomes.len(),
            skipped = run.skipped_unchanged.len(),
            dry_run = run.dry_run,
            duration_ms = run.duration_ms,
            "weekly sync finished"
        );
        Ok(run)
    }

    /// Scan and classify without touching lanes or state.
    ///
    /// `only` restricts the run to the given ids; an unknown id is an error.
    pub fn scan(&self, only: &[String]) -> Result<ScanRun> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let cfg = &self.run;

        if !cfg.source.is_dir() {
            return Err(VetError::SourceNotFound(cfg.source.clone()));
        }
        let discovery = discover(&cfg.source)?;
        let ids: Vec<String> = if only.is_empty() {
            discovery.ids.clone()
        } else {
            let mut wanted: Vec<String> = only.to_vec();
            wanted.sort();
            wanted.dedup();
            if let Some(missing) = wanted.iter().find(|id| !discovery.ids.contains(*id)) {
                return Err(VetError::SkillNotFound(missing.clone()));
            }
            wanted
        };

        let pool = self.pool()?;
        let verdicts: Vec<(Verdict, String)> = pool.install(|| {
            ids.par_iter()
                .map(|id| {
                    let bundle = SkillBundle::read(&cfg.source.join(id), id, cfg.max_file_bytes);
                    let verdict = Verdict::from_outcome(id, self.scanner.scan(&bundle));
                    (verdict, bundle.content_hash)
                })
                .collect()
        });

        let run = ScanRun {
            started_at,
            finished_at: Utc::now(),
            duration_ms: timer.elapsed().as_millis(),
            source: cfg.source.clone(),
            workers: cfg.worker_count(),
            discovered: discovery.ids.len(),
            verdicts,
            ignored: discovery.ignored,
        };
        info!(scanned = run.verdicts.len(), duration_ms = run.duration_ms, "scan finished");
        Ok(run)
    }

    fn pool(&self) -> Result<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.run.worker_count())
            .thread_name(|idx| format!("skillvet-worker-{idx}"))
            .build()
            .map_err(|err| VetError::Config(format!("build worker pool: {err}")))
    }

    fn evaluate(
        &self,
        skill_id: &str,
        state: &SyncState,
        lists: &PolicyLists,
        options: DecideOptions,
    ) -> Evaluated {
        let bundle = SkillBundle::read(&self.run.source.join(skill_id), skill_id, self.run.max_file_bytes);
        let change = state.change_for(skill_id, &bundle.content_hash);

        if self.run.new_only && change == BundleChange::Unchanged {
            debug!(skill_id, "unchanged; skipped in new-only mode");
            return Evaluated {
                bundle,
                change,
                judged: None,
            };
        }

        let verdict = Verdict::from_outcome(skill_id, self.scanner.scan(&bundle));
        let decision = decide(skill_id, verdict.overall_severity, lists, options);
        debug!(
            skill_id,
            severity = %verdict.overall_severity,
            disposition = %decision.disposition,
            findings = verdict.findings.len(),
            "evaluated bundle"
        );
        Evaluated {
            bundle,
            change,
            judged: Some((verdict, decision)),
        }
    }

    fn settle(
        &self,
        lanes: &LaneManager,
        bundle: SkillBundle,
        change: BundleChange,
        verdict: Verdict,
        decision: Decision,
        previous: Option<&SyncRecord>,
    ) -> (BundleOutcome, Option<SyncRecord>) {
        let skill_id = bundle.id.clone();
        let placement = lanes.placement(&skill_id);
        let same_hash = previous.is_some_and(|r| r.content_hash == bundle.content_hash);
        let rule_ids = verdict.rule_ids();

        let retained = previous.filter(|r| {
            r.manual
                && same_hash
                && decision.disposition.content_lane() != Lane::Quarantine
                && placement.disposition() == Some(r.disposition)
        });

        let (operation, error) = if retained.is_some() {
            (LaneOperation::Retained, None)
        } else if same_hash && placement.matches(decision.disposition) {
            (LaneOperation::Unchanged, None)
        } else if self.run.dry_run {
            (LaneOperation::Planned, None)
        } else {
            match lanes.apply(&skill_id, &bundle.members, decision.disposition, &rule_ids) {
                Ok(()) => {
                    info!(skill_id = %skill_id, disposition = %decision.disposition, "applied lane transition");
                    (LaneOperation::Applied, None)
                }
                Err(err) => {
                    warn!(skill_id = %skill_id, error = %err, "lane transition failed");
                    (LaneOperation::Failed, Some(err.to_string()))
                }
            }
        };

        let now = Utc::now();
        let (lane, record) = match operation {
            LaneOperation::Retained => {
                let kept = previous.map(|r| SyncRecord {
                    overall_severity: verdict.overall_severity,
                    rule_ids: rule_ids.clone(),
                    timestamp: now,
                    ..r.clone()
                });
                (placement.lane_state(), kept)
            }
            LaneOperation::Failed => (lanes.placement(&skill_id).lane_state(), None),
            LaneOperation::Planned => (decision.disposition.content_lane().into(), None),
            LaneOperation::Applied | LaneOperation::Unchanged => {
                let lane: LaneState = decision.disposition.content_lane().into();
                let record = SyncRecord {
                    skill_id: skill_id.clone(),
                    content_hash: bundle.content_hash.clone(),
                    overall_severity: verdict.overall_severity,
                    lane,
                    disposition: decision.disposition,
                    reason: decision.reason,
                    manual: false,
                    rule_ids,
                    timestamp: now,
                };
                (lane, Some(record))
            }
        };

        let outcome = BundleOutcome {
            skill_id,
            change,
            content_hash: bundle.content_hash,
            verdict,
            decision,
            operation,
            lane,
            error,
        };
        (outcome, record)
    }
}
