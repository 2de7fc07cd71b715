//! skillvet weekly-sync - scan a source pack and move every bundle into its lane

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use super::{LaneArgs, PolicyArgs, severity_label};
use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_output};
use crate::config::RunConfig;
use crate::core::verdict::OverallSeverity;
use crate::error::Result;
use crate::report::{ReportMode, RunReport};
use crate::sync::SyncEngine;
use crate::utils::format::format_duration_ms;

#[derive(Args, Debug)]
pub struct WeeklySyncArgs {
    /// Directory holding one folder per upstream skill bundle
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,

    #[command(flatten)]
    pub lanes: LaneArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,

    /// Compute decisions and write the report without touching lanes or state
    #[arg(long)]
    pub dry_run: bool,

    /// Only process bundles that are new or changed since the last run
    #[arg(long)]
    pub new_only: bool,

    /// Place warning-level bundles in the active lane
    #[arg(long)]
    pub allow_warnings: bool,

    /// Send warning-level bundles to inactive without an active placeholder
    #[arg(long)]
    pub no_placeholder_warnings: bool,

    /// Also write a placeholder into the active lane for danger-level bundles
    #[arg(long)]
    pub placeholder_danger: bool,

    /// Exit with status 2 when any danger finding exists
    #[arg(long)]
    pub fail_on_danger: bool,

    /// Move displaced lane entries here instead of deleting them
    #[arg(long, value_name = "DIR")]
    pub backup_root: Option<PathBuf>,

    /// Worker threads (0 = one per CPU)
    #[arg(long)]
    pub workers: Option<usize>,

    /// JSON report path
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Markdown verdict path
    #[arg(long, value_name = "FILE")]
    pub verdict: Option<PathBuf>,

    /// Sync state file path
    #[arg(long, value_name = "FILE")]
    pub state: Option<PathBuf>,
}

impl WeeklySyncArgs {
    /// Resolve flags over the loaded config.
    #[must_use]
    pub fn run_config(&self, ctx: &AppContext) -> RunConfig {
        let config = self.lanes.apply(&ctx.config);
        let mut run = RunConfig::from_config(self.source.clone(), &config);
        self.policy.apply(&mut run);
        run.dry_run = self.dry_run;
        run.new_only = self.new_only;
        run.allow_warnings |= self.allow_warnings;
        run.suppress_placeholder_warnings |= self.no_placeholder_warnings;
        run.placeholder_danger |= self.placeholder_danger;
        run.fail_on_danger |= self.fail_on_danger;
        if let Some(root) = &self.backup_root {
            run.backup_root = Some(root.clone());
        }
        if let Some(workers) = self.workers {
            run.workers = workers;
        }
        if let Some(state) = &self.state {
            run.state_path.clone_from(state);
        }
        run.report_path.clone_from(&self.report);
        run.verdict_path.clone_from(&self.verdict);
        run
    }
}

#[derive(Serialize)]
struct WeeklySyncOutput<'a> {
    report_path: PathBuf,
    verdict_path: PathBuf,
    report: &'a RunReport,
}

pub fn run(ctx: &AppContext, args: &WeeklySyncArgs) -> Result<()> {
    let run = args.run_config(ctx);
    let engine = SyncEngine::new(run);
    let report = engine.execute()?;
    let cfg = engine.config();

    let danger = cfg.fail_on_danger.then(|| report.danger_error()).flatten();
    if let Some(err) = danger {
        if !ctx.robot_mode {
            print_human(ctx, &report, cfg);
        }
        return Err(err);
    }

    let output = WeeklySyncOutput {
        report_path: cfg.report_path(),
        verdict_path: cfg.verdict_path(),
        report: &report,
    };
    emit_output(&output, ctx.output_format, |out, layout| {
        fill_layout(layout, out.report, &out.report_path, &out.verdict_path);
    })
}

fn print_human(ctx: &AppContext, report: &RunReport, cfg: &RunConfig) {
    let mut layout = HumanLayout::for_format(ctx.output_format);
    fill_layout(&mut layout, report, &cfg.report_path(), &cfg.verdict_path());
    emit_human(layout);
}

pub(crate) fn fill_layout(layout: &mut HumanLayout, report: &RunReport, report_path: &Path, verdict_path: &Path) {
    let s = &report.summary;
    let title = match (report.meta.mode, report.meta.dry_run) {
        (ReportMode::Scan, _) => "Security scan",
        (ReportMode::WeeklySync, true) => "Weekly sync (dry run)",
        (ReportMode::WeeklySync, false) => "Weekly sync",
    };
    layout.title(title);
    layout.push_line(report.verdict_line()).blank();

    layout.section("Content scan");
    layout
        .kv("Discovered", &s.discovered.to_string())
        .kv("Processed", &s.processed.to_string())
        .kv("Duration", &format_duration_ms(report.meta.duration_ms));
    if report.meta.mode == ReportMode::WeeklySync {
        layout.kv(
            "Changes",
            &format!("{} new, {} changed, {} unchanged", s.new, s.changed, s.unchanged),
        );
    }
    layout
        .kv(
            "Severity",
            &format!(
                "{} {}, {} {}, {} {}, {} {}",
                s.by_severity.clean,
                severity_label(OverallSeverity::Clean),
                s.by_severity.warning,
                severity_label(OverallSeverity::Warning),
                s.by_severity.danger,
                severity_label(OverallSeverity::Danger),
                s.by_severity.error,
                severity_label(OverallSeverity::Error),
            ),
        )
        .kv("Skipped files", &s.skipped_files.to_string())
        .kv(
            "Findings",
            &format!("{} ({} danger)", s.findings_total, s.danger_findings_total),
        )
        .blank();

    if let Some(lanes) = &report.lane_outcome {
        let d = lanes.dispositions;
        let o = lanes.operations;
        layout.section("Lane outcome");
        layout
            .kv(
                "Dispositions",
                &format!(
                    "{} active, {} placeholder, {} inactive, {} quarantine ({} with placeholder)",
                    d.active,
                    d.placeholder_inactive,
                    d.inactive,
                    d.quarantine + d.placeholder_quarantine,
                    d.placeholder_quarantine
                ),
            )
            .kv(
                "Operations",
                &format!(
                    "{} applied, {} unchanged, {} retained, {} planned, {} failed",
                    o.applied, o.unchanged, o.retained, o.planned, o.failed
                ),
            )
            .kv(
                "Contained",
                if lanes.all_contained { "yes" } else { "NO" },
            );
        for id in &lanes.uncontained {
            layout.bullet(&format!("{id} not contained"));
        }
        for failed in &lanes.failed {
            layout.bullet(&format!("{}: {}", failed.skill_id, failed.error));
        }
        layout.blank();
    }

    if !report.top_rules.is_empty() {
        layout.section("Top rules");
        for rule in &report.top_rules {
            layout.kv(&rule.rule_id, &rule.count.to_string());
        }
        layout.blank();
    }

    if !report.danger_findings.is_empty() {
        layout.section("Danger findings");
        for entry in &report.danger_findings {
            layout.bullet(&format!(
                "{} {}:{} {}",
                entry.skill_id, entry.file_path, entry.line, entry.rule_id
            ));
        }
        layout.blank();
    }

    layout
        .kv("Report", &report_path.display().to_string())
        .kv("Verdict", &verdict_path.display().to_string());
}
