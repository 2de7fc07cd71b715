//! Run reports and verdict summaries.
//!
//! The content scan verdict (what the scanner found) and the lane outcome
//! (whether offending bundles were contained) are separate sections and are
//! never folded into one flag.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::core::bundle::{IgnoredEntry, ReadError};
use crate::core::policy::{DecisionReason, Disposition};
use crate::core::verdict::{OverallSeverity, RuleCount, Verdict, rule_frequency};
use crate::error::{Result, VetError};
use crate::lanes::{LaneLayout, LaneState};
use crate::sync::engine::{BundleOutcome, LaneOperation, ScanRun, SyncRun};
use crate::sync::state::{BundleChange, StateOrigin};
use crate::utils::fs::atomic_write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    WeeklySync,
    Scan,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub tool: &'static str,
    pub version: &'static str,
    pub mode: ReportMode,
    pub dry_run: bool,
    pub new_only: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lanes: Option<LaneLayout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_origin: Option<StateOrigin>,
    pub workers: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub clean: usize,
    pub warning: usize,
    pub danger: usize,
    pub error: usize,
}

impl SeverityCounts {
    fn add(&mut self, severity: OverallSeverity) {
        match severity {
            OverallSeverity::Clean => self.clean += 1,
            OverallSeverity::Warning => self.warning += 1,
            OverallSeverity::Danger => self.danger += 1,
            OverallSeverity::Error => self.error += 1,
        }
    }
}

/// Counts over the bundles processed by the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub discovered: usize,
    pub processed: usize,
    pub skipped_unchanged: usize,
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub by_severity: SeverityCounts,
    pub skipped_files: usize,
    pub findings_total: usize,
    pub danger_findings_total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VerdictStatus {
    #[serde(rename = "DO NOT USE")]
    DoNotUse,
    #[serde(rename = "REVIEW REQUIRED")]
    ReviewRequired,
    #[serde(rename = "SAFE")]
    Safe,
}

impl VerdictStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DoNotUse => "DO NOT USE",
            Self::ReviewRequired => "REVIEW REQUIRED",
            Self::Safe => "SAFE",
        }
    }
}

impl std::fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the content scan uncovered, independent of lane handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanVerdict {
    pub status: VerdictStatus,
    /// True when no danger findings exist.
    pub passed: bool,
    pub danger_bundles: Vec<String>,
    pub warning_bundles: Vec<String>,
    pub error_bundles: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispositionCounts {
    pub active: usize,
    pub placeholder_inactive: usize,
    pub inactive: usize,
    pub quarantine: usize,
    pub placeholder_quarantine: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationCounts {
    pub applied: usize,
    pub unchanged: usize,
    pub retained: usize,
    pub planned: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTransition {
    pub skill_id: String,
    pub error: String,
}

/// How the lanes were changed, and whether every danger/error bundle was contained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaneOutcome {
    pub dispositions: DispositionCounts,
    pub operations: OperationCounts,
    /// Danger or error bundles not placed in quarantine.
    pub uncontained: Vec<String>,
    pub all_contained: bool,
    pub failed: Vec<FailedTransition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DangerEntry {
    pub skill_id: String,
    pub file_path: String,
    pub rule_id: String,
    pub line: usize,
    pub excerpt: String,
}

/// Per-bundle line in the report.
#[derive(Debug, Clone, Serialize)]
pub struct BundleEntry {
    pub skill_id: String,
    pub overall_severity: OverallSeverity,
    pub content_hash: String,
    pub finding_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_ids: Vec<String>,
    pub skipped_file_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub read_errors: Vec<ReadError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<BundleChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disposition: Option<Disposition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DecisionReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<LaneOperation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<LaneState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// `error` when the lane transition failed, independent of the scan verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome_severity: Option<OverallSeverity>,
}

impl BundleEntry {
    fn from_verdict(verdict: &Verdict, content_hash: &str) -> Self {
        Self {
            skill_id: verdict.skill_id.clone(),
            overall_severity: verdict.overall_severity,
            content_hash: content_hash.to_string(),
            finding_count: verdict.findings.len(),
            rule_ids: verdict.rule_ids(),
            skipped_file_count: verdict.skipped_file_count,
            read_errors: verdict.read_errors.clone(),
            change: None,
            disposition: None,
            reason: None,
            operation: None,
            lane: None,
            error: None,
            outcome_severity: None,
        }
    }

    fn from_outcome(outcome: &BundleOutcome) -> Self {
        Self {
            change: Some(outcome.change),
            disposition: Some(outcome.decision.disposition),
            reason: Some(outcome.decision.reason),
            operation: Some(outcome.operation),
            lane: Some(outcome.lane),
            error: outcome.error.clone(),
            outcome_severity: (outcome.operation == LaneOperation::Failed)
                .then_some(OverallSeverity::Error),
            ..Self::from_verdict(&outcome.verdict, &outcome.content_hash)
        }
    }
}

/// Full JSON report for a sync or scan run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub meta: ReportMeta,
    pub summary: ScanSummary,
    pub scan_verdict: ScanVerdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_outcome: Option<LaneOutcome>,
    pub top_rules: Vec<RuleCount>,
    pub danger_findings: Vec<DangerEntry>,
    pub policy_conflicts: Vec<String>,
    pub stale: Vec<String>,
    pub ignored: Vec<IgnoredEntry>,
    pub bundles: Vec<BundleEntry>,
}

impl RunReport {
    #[must_use]
    pub fn from_sync(run: &SyncRun, top_n: usize) -> Self {
        let verdicts: Vec<&Verdict> = run.outcomes.iter().map(|o| &o.verdict).collect();
        let mut summary = summarize(&verdicts);
        summary.discovered = run.discovered;
        summary.skipped_unchanged = run.skipped_unchanged.len();
        for outcome in &run.outcomes {
            match outcome.change {
                BundleChange::New => summary.new += 1,
                BundleChange::Changed => summary.changed += 1,
                BundleChange::Unchanged => summary.unchanged += 1,
            }
        }
        // Skipped bundles are unchanged by definition.
        summary.unchanged += run.skipped_unchanged.len();

        Self {
            meta: ReportMeta {
                tool: "skillvet",
                version: crate::VERSION,
                mode: ReportMode::WeeklySync,
                dry_run: run.dry_run,
                new_only: run.new_only,
                started_at: run.started_at,
                finished_at: run.finished_at,
                duration_ms: clamp_ms(run.duration_ms),
                source: run.source.clone(),
                lanes: Some(run.layout.clone()),
                state_origin: Some(run.state_origin.clone()),
                workers: run.workers,
            },
            summary,
            scan_verdict: scan_verdict(&verdicts),
            lane_outcome: Some(lane_outcome(&run.outcomes)),
            top_rules: top_rules(&verdicts, top_n),
            danger_findings: danger_entries(&verdicts),
            policy_conflicts: run.policy_conflicts.clone(),
            stale: run.stale.clone(),
            ignored: run.ignored.clone(),
            bundles: run.outcomes.iter().map(BundleEntry::from_outcome).collect(),
        }
    }

    #[must_use]
    pub fn from_scan(run: &ScanRun, top_n: usize) -> Self {
        let verdicts: Vec<&Verdict> = run.verdicts.iter().map(|(v, _)| v).collect();
        let mut summary = summarize(&verdicts);
        summary.discovered = run.discovered;

        Self {
            meta: ReportMeta {
                tool: "skillvet",
                version: crate::VERSION,
                mode: ReportMode::Scan,
                dry_run: false,
                new_only: false,
                started_at: run.started_at,
                finished_at: run.finished_at,
                duration_ms: clamp_ms(run.duration_ms),
                source: run.source.clone(),
                lanes: None,
                state_origin: None,
                workers: run.workers,
            },
            summary,
            scan_verdict: scan_verdict(&verdicts),
            lane_outcome: None,
            top_rules: top_rules(&verdicts, top_n),
            danger_findings: danger_entries(&verdicts),
            policy_conflicts: Vec::new(),
            stale: Vec::new(),
            ignored: run.ignored.clone(),
            bundles: run
                .verdicts
                .iter()
                .map(|(verdict, hash)| BundleEntry::from_verdict(verdict, hash))
                .collect(),
        }
    }

    /// The error `--fail-on-danger` turns a danger verdict into.
    #[must_use]
    pub fn danger_error(&self) -> Option<VetError> {
        (!self.scan_verdict.passed).then(|| VetError::DangerDetected {
            bundles: self.scan_verdict.danger_bundles.len(),
            findings: self.summary.danger_findings_total,
        })
    }

    /// One-line pass/fail statement.
    #[must_use]
    pub fn verdict_line(&self) -> String {
        let s = &self.summary;
        match self.scan_verdict.status {
            VerdictStatus::DoNotUse => format!(
                "DO NOT USE: {} danger finding(s) in {} bundle(s)",
                s.danger_findings_total,
                self.scan_verdict.danger_bundles.len()
            ),
            VerdictStatus::ReviewRequired => format!(
                "REVIEW REQUIRED: {} warning and {} error bundle(s), no danger findings",
                s.by_severity.warning, s.by_severity.error
            ),
            VerdictStatus::Safe => format!("SAFE: {} bundle(s) scanned, all clean", s.processed),
        }
    }

    /// Markdown verdict summary.
    #[must_use]
    pub fn render_markdown(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        let title = match self.meta.mode {
            ReportMode::WeeklySync => "Weekly Sync Verdict",
            ReportMode::Scan => "Security Scan Verdict",
        };
        let _ = writeln!(out, "# {title}\n");
        let _ = writeln!(out, "**{}**\n", self.verdict_line());
        let _ = writeln!(
            out,
            "Run finished {} ({} ms){}.\n",
            self.meta.finished_at.to_rfc3339(),
            self.meta.duration_ms,
            if self.meta.dry_run { ", dry run" } else { "" }
        );

        let _ = writeln!(out, "## Content scan\n");
        let _ = writeln!(
            out,
            "Scanned {} of {} discovered bundle(s): {} clean, {} warning, {} danger, {} error. \
             {} file(s) were skipped as binary and {} finding(s) were recorded, {} of them danger.\n",
            s.processed,
            s.discovered,
            s.by_severity.clean,
            s.by_severity.warning,
            s.by_severity.danger,
            s.by_severity.error,
            s.skipped_files,
            s.findings_total,
            s.danger_findings_total
        );
        if self.meta.mode == ReportMode::WeeklySync {
            let _ = writeln!(
                out,
                "Bundles: {} new, {} changed, {} unchanged ({} skipped).\n",
                s.new, s.changed, s.unchanged, s.skipped_unchanged
            );
        }

        if let Some(lanes) = &self.lane_outcome {
            let d = lanes.dispositions;
            let o = lanes.operations;
            let _ = writeln!(out, "## Lane outcome\n");
            let _ = writeln!(
                out,
                "Dispositions: {} active, {} placeholder + inactive, {} inactive, {} quarantine, {} placeholder + quarantine.",
                d.active, d.placeholder_inactive, d.inactive, d.quarantine, d.placeholder_quarantine
            );
            let _ = writeln!(
                out,
                "Operations: {} applied, {} unchanged, {} retained, {} planned, {} failed.",
                o.applied, o.unchanged, o.retained, o.planned, o.failed
            );
            if lanes.all_contained {
                let _ = writeln!(out, "All danger and error bundles are contained.\n");
            } else {
                let _ = writeln!(
                    out,
                    "NOT contained: {}.\n",
                    lanes.uncontained.join(", ")
                );
            }
            for failed in &lanes.failed {
                let _ = writeln!(out, "- `{}` failed: {}", failed.skill_id, failed.error);
            }
            if !lanes.failed.is_empty() {
                out.push('\n');
            }
        }

        if !self.top_rules.is_empty() {
            let _ = writeln!(out, "## Top offending rules\n");
            let _ = writeln!(out, "| Rule | Count |\n|---|---|");
            for rule in &self.top_rules {
                let _ = writeln!(out, "| {} | {} |", rule.rule_id, rule.count);
            }
            out.push('\n');
        }

        if !self.danger_findings.is_empty() {
            let _ = writeln!(out, "## Danger findings\n");
            let _ = writeln!(out, "| Skill | File | Line | Rule |\n|---|---|---|---|");
            for entry in &self.danger_findings {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} |",
                    entry.skill_id, entry.file_path, entry.line, entry.rule_id
                );
            }
            out.push('\n');
        }

        if !self.policy_conflicts.is_empty() {
            let _ = writeln!(
                out,
                "Policy conflicts (denylist wins): {}\n",
                self.policy_conflicts.join(", ")
            );
        }
        if !self.stale.is_empty() {
            let _ = writeln!(
                out,
                "Stale records (no longer in source): {}\n",
                self.stale.join(", ")
            );
        }
        out
    }
}

/// Write the JSON report and markdown verdict atomically.
pub fn write_artifacts(report: &RunReport, report_path: &Path, verdict_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    atomic_write(report_path, json.as_bytes())?;
    atomic_write(verdict_path, report.render_markdown().as_bytes())?;
    info!(
        report = %report_path.display(),
        verdict = %verdict_path.display(),
        "wrote run report"
    );
    Ok(())
}

fn summarize(verdicts: &[&Verdict]) -> ScanSummary {
    let mut summary = ScanSummary {
        processed: verdicts.len(),
        ..ScanSummary::default()
    };
    for verdict in verdicts {
        summary.by_severity.add(verdict.overall_severity);
        summary.skipped_files += verdict.skipped_file_count;
        summary.findings_total += verdict.findings.len();
        summary.danger_findings_total += verdict.danger_findings().count();
    }
    summary
}

fn scan_verdict(verdicts: &[&Verdict]) -> ScanVerdict {
    let ids_with = |severity: OverallSeverity| -> Vec<String> {
        let mut ids: Vec<String> = verdicts
            .iter()
            .filter(|v| v.overall_severity == severity)
            .map(|v| v.skill_id.clone())
            .collect();
        ids.sort();
        ids
    };
    let danger_bundles = ids_with(OverallSeverity::Danger);
    let warning_bundles = ids_with(OverallSeverity::Warning);
    let error_bundles = ids_with(OverallSeverity::Error);

    let status = if !danger_bundles.is_empty() {
        VerdictStatus::DoNotUse
    } else if !warning_bundles.is_empty() || !error_bundles.is_empty() {
        VerdictStatus::ReviewRequired
    } else {
        VerdictStatus::Safe
    };

    ScanVerdict {
        status,
        passed: danger_bundles.is_empty(),
        danger_bundles,
        warning_bundles,
        error_bundles,
    }
}

fn lane_outcome(outcomes: &[BundleOutcome]) -> LaneOutcome {
    let mut dispositions = DispositionCounts::default();
    let mut operations = OperationCounts::default();
    let mut uncontained = Vec::new();
    let mut failed = Vec::new();

    for outcome in outcomes {
        match outcome.decision.disposition {
            Disposition::Active => dispositions.active += 1,
            Disposition::PlaceholderInactive => dispositions.placeholder_inactive += 1,
            Disposition::Inactive => dispositions.inactive += 1,
            Disposition::Quarantine => dispositions.quarantine += 1,
            Disposition::PlaceholderQuarantine => dispositions.placeholder_quarantine += 1,
        }
        match outcome.operation {
            LaneOperation::Applied => operations.applied += 1,
            LaneOperation::Unchanged => operations.unchanged += 1,
            LaneOperation::Retained => operations.retained += 1,
            LaneOperation::Planned => operations.planned += 1,
            LaneOperation::Failed => operations.failed += 1,
        }

        let offending = matches!(
            outcome.verdict.overall_severity,
            OverallSeverity::Danger | OverallSeverity::Error
        );
        if offending && !outcome.contained() {
            uncontained.push(outcome.skill_id.clone());
        }
        if let Some(error) = &outcome.error {
            failed.push(FailedTransition {
                skill_id: outcome.skill_id.clone(),
                error: error.clone(),
            });
        }
    }

    LaneOutcome {
        dispositions,
        operations,
        all_contained: uncontained.is_empty(),
        uncontained,
        failed,
    }
}

fn top_rules(verdicts: &[&Verdict], top_n: usize) -> Vec<RuleCount> {
    let mut ranked = rule_frequency(verdicts.iter().copied());
    ranked.truncate(top_n);
    ranked
}

fn danger_entries(verdicts: &[&Verdict]) -> Vec<DangerEntry> {
    let mut entries: Vec<DangerEntry> = verdicts
        .iter()
        .flat_map(|&verdict| {
            verdict.danger_findings().map(move |finding| DangerEntry {
                skill_id: verdict.skill_id.clone(),
                file_path: finding.file_path.clone(),
                rule_id: finding.rule_id.clone(),
                line: finding.line,
                excerpt: finding.excerpt.clone(),
            })
        })
        .collect();
    entries.sort_by(|a, b| {
        (&a.skill_id, &a.file_path, a.line, &a.rule_id).cmp(&(&b.skill_id, &b.file_path, b.line, &b.rule_id))
    });
    entries
}

fn clamp_ms(ms: u128) -> u64 {
    u64::try_from(ms).unwrap_or(u64::MAX)
}
