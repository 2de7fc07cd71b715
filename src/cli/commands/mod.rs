//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use std::path::PathBuf;

use clap::Args;
use colored::{ColoredString, Colorize};

use crate::app::AppContext;
use crate::cli::Commands;
use crate::config::{Config, RunConfig};
use crate::core::verdict::OverallSeverity;
use crate::error::Result;

pub mod activate;
pub mod init_layout;
pub mod scan;
pub mod status;
pub mod weekly_sync;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::InitLayout(args) => init_layout::run(ctx, args),
        Commands::WeeklySync(args) => weekly_sync::run(ctx, args),
        Commands::Scan(args) => scan::run(ctx, args),
        Commands::Activate(args) => activate::run_activate(ctx, args),
        Commands::Deactivate(args) => activate::run_deactivate(ctx, args),
        Commands::Status(args) => status::run(ctx, args),
    }
}

/// Lane directory overrides shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct LaneArgs {
    /// Active lane directory
    #[arg(long, value_name = "DIR")]
    pub active: Option<PathBuf>,

    /// Inactive lane directory
    #[arg(long, value_name = "DIR")]
    pub inactive: Option<PathBuf>,

    /// Quarantine lane directory
    #[arg(long, value_name = "DIR")]
    pub quarantine: Option<PathBuf>,

    /// Directory for state, reports and the run lock (default: <active>-audit)
    #[arg(long, value_name = "DIR")]
    pub audit_dir: Option<PathBuf>,
}

impl LaneArgs {
    /// Config with these overrides applied on top.
    #[must_use]
    pub fn apply(&self, config: &Config) -> Config {
        let mut config = config.clone();
        let path = |p: &PathBuf| p.to_string_lossy().into_owned();
        if let Some(active) = &self.active {
            config.lanes.active = path(active);
        }
        if let Some(inactive) = &self.inactive {
            config.lanes.inactive = path(inactive);
        }
        if let Some(quarantine) = &self.quarantine {
            config.lanes.quarantine = path(quarantine);
        }
        if let Some(audit) = &self.audit_dir {
            config.lanes.audit = Some(path(audit));
        }
        config
    }
}

/// Allow/deny list overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct PolicyArgs {
    /// Denylist file: one skill id per line
    #[arg(long, value_name = "FILE")]
    pub denylist: Option<PathBuf>,

    /// Allowlist file: one skill id per line
    #[arg(long, value_name = "FILE")]
    pub allowlist: Option<PathBuf>,
}

impl PolicyArgs {
    pub fn apply(&self, run: &mut RunConfig) {
        if let Some(path) = &self.denylist {
            run.denylist_path = Some(path.clone());
        }
        if let Some(path) = &self.allowlist {
            run.allowlist_path = Some(path.clone());
        }
    }
}

/// Run configuration for commands that act on lanes without a source.
pub(crate) fn lane_run_config(ctx: &AppContext, lanes: &LaneArgs, policy: &PolicyArgs) -> RunConfig {
    let config = lanes.apply(&ctx.config);
    let mut run = RunConfig::from_config(PathBuf::new(), &config);
    policy.apply(&mut run);
    run
}

pub(crate) fn severity_label(severity: OverallSeverity) -> ColoredString {
    match severity {
        OverallSeverity::Clean => severity.as_str().green(),
        OverallSeverity::Warning => severity.as_str().yellow(),
        OverallSeverity::Danger => severity.as_str().red().bold(),
        OverallSeverity::Error => severity.as_str().magenta(),
    }
}
