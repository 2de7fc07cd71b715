//! skillvet init-layout - create lane directories and policy stubs

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use tracing::info;

use super::{LaneArgs, PolicyArgs, lane_run_config};
use crate::app::AppContext;
use crate::cli::output::emit_output;
use crate::config::{ALLOWLIST_FILE, DENYLIST_FILE};
use crate::error::Result;
use crate::lanes::{LaneLayout, LaneManager};
use crate::utils::fs::{atomic_write, ensure_dir};

pub const WORKFLOW_FILE: &str = "workflow.json";

const ALLOWLIST_STUB: &str = "\
# skillvet allowlist: one skill id per line.
# When any id is listed here, every unlisted skill is quarantined.
";

const DENYLIST_STUB: &str = "\
# skillvet denylist: one skill id per line.
# Listed skills are always quarantined.
";

#[derive(Args, Debug)]
pub struct InitLayoutArgs {
    #[command(flatten)]
    pub lanes: LaneArgs,

    #[command(flatten)]
    pub policy: PolicyArgs,
}

/// Layout description written to `<audit>/workflow.json`.
#[derive(Debug, Serialize)]
pub struct WorkflowManifest {
    pub tool: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub lanes: LaneLayout,
    pub audit_dir: PathBuf,
    pub allowlist: PathBuf,
    pub denylist: PathBuf,
    pub state_path: PathBuf,
    pub commands: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InitLayoutOutput {
    pub manifest_path: PathBuf,
    /// Policy stubs written by this invocation.
    pub created: Vec<PathBuf>,
    pub manifest: WorkflowManifest,
}

pub fn run(ctx: &AppContext, args: &InitLayoutArgs) -> Result<()> {
    let run = lane_run_config(ctx, &args.lanes, &args.policy);
    LaneManager::new(run.layout.clone(), None).ensure_layout()?;
    ensure_dir(&run.audit_dir)?;

    let allowlist = run
        .allowlist_path
        .clone()
        .unwrap_or_else(|| run.audit_dir.join(ALLOWLIST_FILE));
    let denylist = run
        .denylist_path
        .clone()
        .unwrap_or_else(|| run.audit_dir.join(DENYLIST_FILE));

    let mut created = Vec::new();
    for (path, stub) in [(&allowlist, ALLOWLIST_STUB), (&denylist, DENYLIST_STUB)] {
        if write_stub(path, stub)? {
            created.push(path.clone());
        }
    }

    let manifest = WorkflowManifest {
        tool: "skillvet".to_string(),
        version: crate::VERSION.to_string(),
        created_at: Utc::now(),
        lanes: run.layout.clone(),
        audit_dir: run.audit_dir.clone(),
        allowlist,
        denylist,
        state_path: run.state_path.clone(),
        commands: workflow_commands(&run.layout),
    };
    let manifest_path = run.audit_dir.join(WORKFLOW_FILE);
    atomic_write(&manifest_path, serde_json::to_string_pretty(&manifest)?.as_bytes())?;
    info!(path = %manifest_path.display(), "wrote workflow manifest");

    let output = InitLayoutOutput {
        manifest_path,
        created,
        manifest,
    };
    emit_output(&output, ctx.output_format, |out, layout| {
        layout.title("Lane layout ready");
        layout
            .kv("Active", &out.manifest.lanes.active.display().to_string())
            .kv("Inactive", &out.manifest.lanes.inactive.display().to_string())
            .kv("Quarantine", &out.manifest.lanes.quarantine.display().to_string())
            .kv("Audit", &out.manifest.audit_dir.display().to_string())
            .kv("Manifest", &out.manifest_path.display().to_string())
            .blank();
        if !out.created.is_empty() {
            layout.section("Created");
            for path in &out.created {
                layout.bullet(&path.display().to_string());
            }
            layout.blank();
        }
        layout.section("Next");
        for command in &out.manifest.commands {
            layout.bullet(command);
        }
    })
}

/// Write `stub` unless a file already exists. Returns whether it wrote.
fn write_stub(path: &Path, stub: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, stub.as_bytes())?;
    Ok(true)
}

fn workflow_commands(layout: &LaneLayout) -> Vec<String> {
    let active = layout.active.display();
    vec![
        "skillvet scan --source <pack>".to_string(),
        "skillvet weekly-sync --source <pack> --dry-run".to_string(),
        "skillvet weekly-sync --source <pack>".to_string(),
        format!("skillvet status --active {active}"),
    ]
}
