//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use output::OutputFormat;

pub mod commands;
pub mod output;

/// Skillvet - vet untrusted skill bundles and sync them into lanes
#[derive(Parser, Debug)]
#[command(name = "skillvet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable JSON output for machine consumption.
    /// Same as --output-format=json or -m.
    #[arg(long, global = true, hide = true)]
    pub robot: bool,

    /// Output format (human, json, plain)
    #[arg(long, short = 'O', global = true, value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Enable machine-readable JSON output (shorthand for --output-format=json).
    #[arg(long, short = 'm', global = true)]
    pub machine: bool,

    /// Force plain output (no colors)
    #[arg(long, global = true)]
    pub plain: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/skillvet/config.toml)
    #[arg(long, global = true, env = "SKILLVET_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective output format.
    ///
    /// Priority order:
    /// 1. `--plain` → Plain format
    /// 2. `--output-format` → Explicit format
    /// 3. `--machine` / `--robot` → JSON format
    /// 4. Default → Human format
    #[must_use]
    pub fn output_format(&self) -> OutputFormat {
        if self.plain {
            return OutputFormat::Plain;
        }
        if let Some(fmt) = self.output_format {
            return fmt;
        }
        if self.machine || self.robot {
            return OutputFormat::Json;
        }
        OutputFormat::Human
    }

    /// JSON logs and JSON errors.
    #[must_use]
    pub fn machine_output(&self) -> bool {
        self.output_format().is_machine_readable()
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the lane directories, audit directory and policy stubs
    InitLayout(commands::init_layout::InitLayoutArgs),

    /// Scan a source pack and sync every bundle into its lane
    WeeklySync(commands::weekly_sync::WeeklySyncArgs),

    /// One-shot audit of a source pack, no lane or state changes
    Scan(commands::scan::ScanArgs),

    /// Promote a skill into the active lane
    Activate(commands::activate::ActivateArgs),

    /// Move a skill out of the active lane
    Deactivate(commands::activate::DeactivateArgs),

    /// Show recorded sync state and current lane placement
    Status(commands::status::StatusArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn output_format_priority() {
        let cli = Cli::parse_from(["skillvet", "--plain", "-m", "status"]);
        assert_eq!(cli.output_format(), OutputFormat::Plain);

        let cli = Cli::parse_from(["skillvet", "-m", "status"]);
        assert_eq!(cli.output_format(), OutputFormat::Json);

        let cli = Cli::parse_from(["skillvet", "--robot", "status"]);
        assert!(cli.machine_output());

        let cli = Cli::parse_from(["skillvet", "status"]);
        assert_eq!(cli.output_format(), OutputFormat::Human);
    }

    #[test]
    fn weekly_sync_flags_parse() {
        let cli = Cli::parse_from([
            "skillvet",
            "weekly-sync",
            "--source",
            "/tmp/src",
            "--active",
            "/tmp/a",
            "--dry-run",
            "--new-only",
            "--allow-warnings",
            "--no-placeholder-warnings",
            "--placeholder-danger",
            "--fail-on-danger",
        ]);
        match cli.command {
            Commands::WeeklySync(args) => {
                assert_eq!(args.source, PathBuf::from("/tmp/src"));
                assert_eq!(args.lanes.active, Some(PathBuf::from("/tmp/a")));
                assert!(args.dry_run && args.new_only && args.allow_warnings);
                assert!(args.no_placeholder_warnings && args.fail_on_danger);
                assert!(args.placeholder_danger);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn scan_accepts_repeated_skill() {
        let cli = Cli::parse_from([
            "skillvet", "scan", "--source", "/s", "--skill", "alpha", "--skill", "delta",
        ]);
        match cli.command {
            Commands::Scan(args) => assert_eq!(args.skill, vec!["alpha", "delta"]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn manual_commands_take_repeated_skill() {
        let cli = Cli::parse_from([
            "skillvet", "activate", "--skill", "alpha", "--skill", "bravo", "--allow-warnings",
        ]);
        match cli.command {
            Commands::Activate(args) => {
                assert_eq!(args.skills, vec!["alpha", "bravo"]);
                assert!(args.allow_warnings && !args.force);
            }
            other => panic!("unexpected command {other:?}"),
        }

        let cli = Cli::parse_from(["skillvet", "deactivate", "--skill", "alpha", "--skill", "echo"]);
        match cli.command {
            Commands::Deactivate(args) => assert_eq!(args.skills, vec!["alpha", "echo"]),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["skillvet", "deactivate"]).is_err());
    }
}
