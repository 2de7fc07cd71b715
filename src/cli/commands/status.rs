//! skillvet status - recorded state versus current lanes

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use super::{LaneArgs, PolicyArgs, lane_run_config, severity_label};
use crate::app::AppContext;
use crate::cli::output::emit_output;
use crate::error::Result;
use crate::lanes::lock::{LockHolder, RunLock};
use crate::lanes::{ActiveSlot, Lane, LaneLayout, LaneState, Placement};
use crate::sync::{StateOrigin, SyncRecord, SyncStateStore};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show this skill id
    #[arg(long, value_name = "ID")]
    pub skill: Option<String>,

    #[command(flatten)]
    pub lanes: LaneArgs,
}

#[derive(Debug, Serialize)]
pub struct SkillStatus {
    pub record: SyncRecord,
    pub observed: LaneState,
    pub placeholder: bool,
    /// Lanes still reflect the recorded disposition.
    pub in_sync: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    pub lanes: LaneLayout,
    pub audit_dir: PathBuf,
    pub state_path: PathBuf,
    pub state_origin: StateOrigin,
    pub last_run: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockHolder>,
    pub skills: Vec<SkillStatus>,
    /// Lane slots with no sync record.
    pub untracked: Vec<String>,
}

pub fn run(ctx: &AppContext, args: &StatusArgs) -> Result<()> {
    let run = lane_run_config(ctx, &args.lanes, &PolicyArgs::default());
    let (state, state_origin) = SyncStateStore::new(&run.state_path).load();

    let wanted = |id: &str| args.skill.as_deref().is_none_or(|s| s == id);
    let skills: Vec<SkillStatus> = state
        .skills
        .values()
        .filter(|r| wanted(&r.skill_id))
        .map(|record| {
            let placement = Placement::observe(&run.layout, &record.skill_id);
            SkillStatus {
                observed: placement.lane_state(),
                placeholder: placement.active == ActiveSlot::Placeholder,
                in_sync: placement.matches(record.disposition),
                record: record.clone(),
            }
        })
        .collect();

    let mut in_lanes = BTreeSet::new();
    for lane in Lane::ALL {
        in_lanes.extend(run.layout.list(lane)?);
    }
    let untracked = in_lanes
        .into_iter()
        .filter(|id| wanted(id.as_str()) && !state.skills.contains_key(id))
        .collect();

    let report = StatusReport {
        config_path: ctx.config_path.clone(),
        lanes: run.layout.clone(),
        audit_dir: run.audit_dir.clone(),
        state_path: run.state_path.clone(),
        state_origin,
        last_run: state.last_run,
        lock: RunLock::status(&run.audit_dir),
        skills,
        untracked,
    };

    emit_output(&report, ctx.output_format, |out, layout| {
        layout.title("skillvet status");
        layout
            .kv("Active", &out.lanes.active.display().to_string())
            .kv("Inactive", &out.lanes.inactive.display().to_string())
            .kv("Quarantine", &out.lanes.quarantine.display().to_string())
            .kv("State", &out.state_path.display().to_string())
            .kv(
                "Last run",
                &out.last_run
                    .map_or_else(|| "never".to_string(), |t| t.to_rfc3339()),
            );
        if let Some(holder) = &out.lock {
            layout.kv(
                "Lock",
                &format!("pid {} on {} since {}", holder.pid, holder.hostname, holder.acquired_at),
            );
        }
        layout.blank();

        if !out.skills.is_empty() {
            layout.section("Skills");
            for skill in &out.skills {
                let r = &skill.record;
                let drift = if skill.in_sync { "" } else { " (lanes differ)" };
                let manual = if r.manual { " manual" } else { "" };
                layout.kv(
                    &r.skill_id,
                    &format!(
                        "{} {}{manual}{drift}",
                        severity_label(r.overall_severity),
                        r.disposition
                    ),
                );
            }
            layout.blank();
        }
        if !out.untracked.is_empty() {
            layout.section("Untracked");
            for id in &out.untracked {
                layout.bullet(id);
            }
        }
    })
}
