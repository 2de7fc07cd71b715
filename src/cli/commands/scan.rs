//! skillvet scan - one-shot audit of a source pack

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::LaneArgs;
use super::weekly_sync::fill_layout;
use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_output};
use crate::config::{RunConfig, SCAN_REPORT_FILE, SCAN_VERDICT_FILE};
use crate::error::Result;
use crate::report::{RunReport, write_artifacts};
use crate::sync::SyncEngine;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directory holding one folder per upstream skill bundle
    #[arg(long, value_name = "DIR")]
    pub source: PathBuf,

    /// Only scan these skill ids (repeatable)
    #[arg(long, value_name = "ID")]
    pub skill: Vec<String>,

    /// Lane flags only locate the default audit directory
    #[command(flatten)]
    pub lanes: LaneArgs,

    /// JSON report path (default: <audit>/SCAN_REPORT.json)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Markdown verdict path (default: <audit>/SCAN_VERDICT.md)
    #[arg(long, value_name = "FILE")]
    pub verdict: Option<PathBuf>,

    /// Exit with status 2 when any danger finding exists
    #[arg(long)]
    pub fail_on_danger: bool,

    /// Worker threads (0 = one per CPU)
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Serialize)]
struct ScanOutput<'a> {
    report_path: PathBuf,
    verdict_path: PathBuf,
    report: &'a RunReport,
}

pub fn run(ctx: &AppContext, args: &ScanArgs) -> Result<()> {
    let config = args.lanes.apply(&ctx.config);
    let mut run = RunConfig::from_config(args.source.clone(), &config);
    run.fail_on_danger |= args.fail_on_danger;
    if let Some(workers) = args.workers {
        run.workers = workers;
    }
    let report_path = args
        .report
        .clone()
        .unwrap_or_else(|| run.audit_dir.join(SCAN_REPORT_FILE));
    let verdict_path = args
        .verdict
        .clone()
        .unwrap_or_else(|| run.audit_dir.join(SCAN_VERDICT_FILE));
    let fail_on_danger = run.fail_on_danger;
    let top_rules = run.top_rules;

    let scan = SyncEngine::new(run).scan(&args.skill)?;
    let report = RunReport::from_scan(&scan, top_rules);
    write_artifacts(&report, &report_path, &verdict_path)?;

    if let Some(err) = fail_on_danger.then(|| report.danger_error()).flatten() {
        if !ctx.robot_mode {
            let mut layout = HumanLayout::for_format(ctx.output_format);
            fill_layout(&mut layout, &report, &report_path, &verdict_path);
            emit_human(layout);
        }
        return Err(err);
    }

    let output = ScanOutput {
        report_path,
        verdict_path,
        report: &report,
    };
    emit_output(&output, ctx.output_format, |out, layout| {
        fill_layout(layout, out.report, &out.report_path, &out.verdict_path);
    })
}
