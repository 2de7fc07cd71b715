//! E2E test fixture: a skill pack, three lanes and an audit directory,
//! driven through the compiled binary with step logging.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use serde_json::Value;
use skillvet::test_utils::TestLogger;
use skillvet::test_utils::fixtures::SkillPackFixture;

/// Step result for the closing report.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub name: String,
    pub exit_code: i32,
    pub duration: Duration,
}

pub struct E2EFixture {
    pub scenario_name: String,
    pub pack: SkillPackFixture,
    logger: TestLogger,
    start_time: Instant,
    step_results: Vec<StepResult>,
}

impl E2EFixture {
    pub fn new(scenario_name: &str) -> Self {
        let logger = TestLogger::new(&format!("e2e::{scenario_name}"));
        let pack = SkillPackFixture::new();
        logger.log_input("root", &pack.root);

        Self {
            scenario_name: scenario_name.to_string(),
            pack,
            logger,
            start_time: Instant::now(),
            step_results: Vec::new(),
        }
    }

    pub fn log_step(&mut self, description: &str) {
        self.logger.step(description);
    }

    /// Run `skillvet -m <subcommand> <lane flags> <args>`.
    pub fn run(&mut self, subcommand: &str, args: &[&str]) -> CommandOutput {
        let mut full: Vec<String> = vec!["-m".to_string(), subcommand.to_string()];
        full.extend(self.pack.lane_flags());
        full.extend(args.iter().map(|a| (*a).to_string()));
        self.run_raw(&full)
    }

    /// `weekly-sync --source <fixture source>` plus `args`.
    pub fn weekly_sync(&mut self, args: &[&str]) -> CommandOutput {
        let source = self.pack.source().to_string_lossy().into_owned();
        let mut full = vec!["--source", source.as_str()];
        full.extend_from_slice(args);
        self.run("weekly-sync", &full)
    }

    pub fn run_raw(&mut self, args: &[String]) -> CommandOutput {
        let step_name = format!("skillvet {}", args.join(" "));
        let start = Instant::now();
        println!("[CMD] {step_name}");

        let output = Command::new(env!("CARGO_BIN_EXE_skillvet"))
            .args(args)
            .env("HOME", &self.pack.root)
            .env("XDG_CONFIG_HOME", self.pack.root.join(".config"))
            .env_remove("SKILLVET_CONFIG")
            .env("RUST_LOG", "skillvet=debug")
            .current_dir(&self.pack.root)
            .output()
            .expect("Failed to execute skillvet");

        let elapsed = start.elapsed();
        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        self.logger.log_actual(&result.exit_code);
        if !result.stderr.is_empty() {
            println!("[STDERR] {}", truncate(&result.stderr, 2000));
        }

        self.step_results.push(StepResult {
            name: step_name,
            exit_code: result.exit_code,
            duration: elapsed,
        });
        result
    }

    /// Every file under the lanes plus the state file, keyed by path relative to the root.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<u8>> {
        let mut files = BTreeMap::new();
        let layout = self.pack.layout();
        let state = self.pack.audit_dir().join(skillvet::config::STATE_FILE);
        let roots = [layout.active.clone(), layout.inactive.clone(), layout.quarantine.clone()];
        for root in &roots {
            if !root.exists() {
                continue;
            }
            for entry in walkdir::WalkDir::new(root).sort_by_file_name() {
                let entry = entry.expect("walk lane");
                let rel = entry
                    .path()
                    .strip_prefix(&self.pack.root)
                    .expect("inside root")
                    .to_string_lossy()
                    .into_owned();
                let bytes = if entry.file_type().is_file() {
                    std::fs::read(entry.path()).expect("read lane file")
                } else {
                    Vec::new()
                };
                files.insert(rel, bytes);
            }
        }
        if state.exists() {
            files.insert("STATE".to_string(), std::fs::read(&state).expect("read state"));
        }
        files
    }

    pub fn slot(&self, lane: &str, skill_id: &str) -> PathBuf {
        let layout = self.pack.layout();
        let dir = match lane {
            "active" => layout.active,
            "inactive" => layout.inactive,
            "quarantine" => layout.quarantine,
            other => panic!("unknown lane {other}"),
        };
        dir.join(skill_id)
    }

    pub fn read_json(&self, path: &Path) -> Value {
        let raw = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
        serde_json::from_str(&raw).expect("valid JSON")
    }

    pub fn assert_exit(&self, output: &CommandOutput, expected: i32, operation: &str) {
        assert_eq!(
            output.exit_code, expected,
            "[E2E] {operation} exited {} (expected {expected})\nstdout: {}\nstderr: {}",
            output.exit_code,
            truncate(&output.stdout, 1000),
            truncate(&output.stderr, 1000)
        );
        println!("[ASSERT] {operation} exit {expected} - PASSED");
    }

    pub fn assert_success(&self, output: &CommandOutput, operation: &str) {
        self.assert_exit(output, 0, operation);
    }

    pub fn generate_report(&self) {
        println!();
        println!("{}", "█".repeat(70));
        println!("█ E2E REPORT: {}", self.scenario_name);
        println!("{}", "█".repeat(70));
        for (i, step) in self.step_results.iter().enumerate() {
            println!(
                "{:2}. exit {} {} ({:?})",
                i + 1,
                step.exit_code,
                step.name,
                step.duration
            );
        }
        self.logger.pass();
    }
}

impl Drop for E2EFixture {
    fn drop(&mut self) {
        println!("█ E2E CLEANUP: {} ({:?})", self.scenario_name, self.start_time.elapsed());
    }
}

pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Parsed stdout document.
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", truncate(&self.stdout, 500)))
    }

    /// `data.report` from a sync or scan envelope.
    pub fn report(&self) -> Value {
        self.json()["data"]["report"].clone()
    }
}

/// Report entry for one bundle.
pub fn bundle<'a>(report: &'a Value, skill_id: &str) -> &'a Value {
    report["bundles"]
        .as_array()
        .expect("bundles array")
        .iter()
        .find(|b| b["skill_id"] == skill_id)
        .unwrap_or_else(|| panic!("no bundle {skill_id} in report"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
