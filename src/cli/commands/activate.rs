//! skillvet activate / deactivate - manual lane transitions

use clap::Args;
use serde::Serialize;

use super::{LaneArgs, PolicyArgs, lane_run_config, severity_label};
use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_output};
use crate::error::Result;
use crate::sync::{ManualAction, ManualBatch, ManualOptions, ManualOutcome, run_batch};

#[derive(Args, Debug)]
pub struct ActivateArgs {
    /// Skill id to activate (repeatable)
    #[arg(long = "skill", value_name = "ID", required = true)]
    pub skills: Vec<String>,

    /// Activate even when the skill is not clean or is denylisted
    #[arg(long)]
    pub force: bool,

    /// Let warning-level skills into the active lane
    #[arg(long)]
    pub allow_warnings: bool,

    /// Show what would happen without touching the lanes
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub lanes: LaneArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

#[derive(Args, Debug)]
pub struct DeactivateArgs {
    /// Skill id to deactivate (repeatable)
    #[arg(long = "skill", value_name = "ID", required = true)]
    pub skills: Vec<String>,

    /// Show what would happen without touching the lanes
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub lanes: LaneArgs,
}

#[derive(Serialize)]
struct ManualOutput {
    outcomes: Vec<ManualOutcome>,
}

pub fn run_activate(ctx: &AppContext, args: &ActivateArgs) -> Result<()> {
    let run = lane_run_config(ctx, &args.lanes, &args.policy);
    let options = ManualOptions {
        force: args.force,
        allow_warnings: args.allow_warnings,
        dry_run: args.dry_run,
    };
    finish(ctx, run_batch(&run, ManualAction::Activate, &args.skills, options)?)
}

pub fn run_deactivate(ctx: &AppContext, args: &DeactivateArgs) -> Result<()> {
    let run = lane_run_config(ctx, &args.lanes, &PolicyArgs::default());
    let options = ManualOptions {
        dry_run: args.dry_run,
        ..ManualOptions::default()
    };
    finish(ctx, run_batch(&run, ManualAction::Deactivate, &args.skills, options)?)
}

/// Emit the outcomes, or fail with the first per-skill error after showing
/// what did succeed.
fn finish(ctx: &AppContext, batch: ManualBatch) -> Result<()> {
    let ManualBatch { outcomes, failures } = batch;
    if let Some(first) = failures.into_iter().next() {
        if !ctx.robot_mode && !outcomes.is_empty() {
            let mut layout = HumanLayout::for_format(ctx.output_format);
            fill_layout(&mut layout, &outcomes);
            emit_human(layout);
        }
        return Err(first.error);
    }
    emit_output(&ManualOutput { outcomes }, ctx.output_format, |out, layout| {
        fill_layout(layout, &out.outcomes);
    })
}

fn fill_layout(layout: &mut HumanLayout, outcomes: &[ManualOutcome]) {
    for out in outcomes {
        let verb = match out.action {
            ManualAction::Activate => "Activate",
            ManualAction::Deactivate => "Deactivate",
        };
        layout.title(&format!("{verb} {}", out.skill_id));
        let status = if out.applied {
            "applied"
        } else if out.dry_run {
            "planned (dry run)"
        } else {
            "no change needed"
        };
        layout
            .kv("Status", status)
            .kv("From", &out.from.to_string())
            .kv("To", &out.to.to_string())
            .kv("Severity", &severity_label(out.severity).to_string());
        if let Some(recorded) = out.recorded_severity {
            layout.kv("Recorded", &severity_label(recorded).to_string());
        }
        if !out.rule_ids.is_empty() {
            layout.kv("Rules", &out.rule_ids.join(", "));
        }
        for reason in &out.overridden {
            layout.bullet(&format!("forced past: {reason}"));
        }
        layout.blank();
    }
}
