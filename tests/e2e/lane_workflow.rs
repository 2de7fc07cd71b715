//! E2E Scenario: layout setup, one-shot scan and manual lane transitions
//!
//! - `init-layout` creates lanes, policy stubs and the workflow manifest
//! - `scan` reports without touching lanes or state
//! - `activate` refuses unsafe content unless forced; forced placements
//!   survive later syncs of the same content
//! - `deactivate` moves active content out
//! - both take repeated `--skill` ids; `activate --allow-warnings` admits
//!   warning bundles but never danger ones
//! - `weekly-sync --placeholder-danger` leaves a placeholder in active for
//!   quarantined danger bundles
//! - `status` reflects all of the above

use skillvet::config::{ALLOWLIST_FILE, DENYLIST_FILE, SCAN_REPORT_FILE, SCAN_VERDICT_FILE};
use skillvet::test_utils::fixtures::{CLEAN_SKILL, DANGER_SKILL, WARNING_SKILL};

use super::fixture::{E2EFixture, bundle};

#[test]
fn test_init_layout_creates_lanes_and_manifest() {
    let mut fixture = E2EFixture::new("init_layout");

    let output = fixture.run("init-layout", &[]);
    fixture.assert_success(&output, "init-layout");

    let layout = fixture.pack.layout();
    assert!(layout.active.is_dir());
    assert!(layout.inactive.is_dir());
    assert!(layout.quarantine.is_dir());
    let audit = fixture.pack.audit_dir();
    assert!(audit.join(ALLOWLIST_FILE).is_file());
    assert!(audit.join(DENYLIST_FILE).is_file());

    let manifest = fixture.read_json(&audit.join("workflow.json"));
    assert_eq!(manifest["tool"], "skillvet");
    assert_eq!(
        manifest["lanes"]["quarantine"],
        layout.quarantine.to_string_lossy().as_ref()
    );

    fixture.log_step("Re-running keeps edited policy files");
    std::fs::write(audit.join(DENYLIST_FILE), "charlie\n").unwrap();
    let output = fixture.run("init-layout", &[]);
    fixture.assert_success(&output, "init-layout again");
    assert_eq!(
        std::fs::read_to_string(audit.join(DENYLIST_FILE)).unwrap(),
        "charlie\n"
    );
    assert_eq!(output.json()["data"]["created"], serde_json::json!([]));

    fixture.generate_report();
}

#[test]
fn test_scan_reports_without_touching_lanes() {
    let mut fixture = E2EFixture::new("scan_only");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("delta", DANGER_SKILL);
    let source = fixture.pack.source().to_string_lossy().into_owned();

    fixture.log_step("Whole-pack scan");
    let output = fixture.run("scan", &["--source", &source]);
    fixture.assert_success(&output, "scan");
    let report = output.report();
    assert_eq!(report["meta"]["mode"], "scan");
    assert_eq!(report["scan_verdict"]["status"], "DO NOT USE");
    assert!(report.get("lane_outcome").is_none_or(serde_json::Value::is_null));
    assert!(fixture.snapshot().is_empty());

    let audit = fixture.pack.audit_dir();
    assert!(audit.join(SCAN_REPORT_FILE).is_file());
    let verdict = std::fs::read_to_string(audit.join(SCAN_VERDICT_FILE)).unwrap();
    assert!(verdict.contains("DISK_FORMAT"));

    fixture.log_step("Scan one clean skill");
    let output = fixture.run("scan", &["--source", &source, "--skill", "alpha"]);
    fixture.assert_success(&output, "scan --skill alpha");
    assert_eq!(output.report()["scan_verdict"]["status"], "SAFE");

    fixture.log_step("--fail-on-danger exits 2");
    let output = fixture.run("scan", &["--source", &source, "--fail-on-danger"]);
    fixture.assert_exit(&output, 2, "scan --fail-on-danger");

    fixture.log_step("Unknown skill id");
    let output = fixture.run("scan", &["--source", &source, "--skill", "nope"]);
    fixture.assert_exit(&output, 1, "scan --skill nope");
    assert_eq!(output.json()["status"]["error"]["code"], "SKILL_NOT_FOUND");

    fixture.generate_report();
}

#[test]
fn test_manual_activation_gate_and_retention() {
    let mut fixture = E2EFixture::new("manual_activation");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("bravo", WARNING_SKILL);

    fixture.log_step("Initial sync");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync");

    fixture.log_step("Activation of a warning bundle is refused");
    let output = fixture.run("activate", &["--skill", "bravo"]);
    fixture.assert_exit(&output, 2, "activate bravo");
    assert_eq!(output.json()["status"]["error"]["code"], "ACTIVATION_BLOCKED");
    assert!(skillvet::lanes::placeholder::is_placeholder(&fixture.slot("active", "bravo")));

    fixture.log_step("Dry-run forced activation changes nothing");
    let before = fixture.snapshot();
    let output = fixture.run("activate", &["--skill", "bravo", "--force", "--dry-run"]);
    fixture.assert_success(&output, "activate --dry-run");
    assert_eq!(before, fixture.snapshot());

    fixture.log_step("Forced activation");
    let output = fixture.run("activate", &["--skill", "bravo", "--force"]);
    fixture.assert_success(&output, "activate --force");
    let json = output.json();
    let data = &json["data"]["outcomes"][0];
    assert_eq!(data["skill_id"], "bravo");
    assert_eq!(data["applied"], true);
    assert_eq!(data["to"], "active");
    assert!(!data["overridden"].as_array().unwrap().is_empty());
    assert_eq!(
        std::fs::read_to_string(fixture.slot("active", "bravo").join("SKILL.md")).unwrap(),
        WARNING_SKILL
    );
    assert!(!fixture.slot("inactive", "bravo").exists());

    fixture.log_step("Next sync keeps the manual placement");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync after activate");
    assert_eq!(bundle(&output.report(), "bravo")["operation"], "retained");
    assert!(!skillvet::lanes::placeholder::is_placeholder(&fixture.slot("active", "bravo")));

    fixture.log_step("Deactivate a clean skill");
    let output = fixture.run("deactivate", &["--skill", "alpha"]);
    fixture.assert_success(&output, "deactivate alpha");
    assert!(fixture.slot("inactive", "alpha").join("SKILL.md").is_file());
    assert!(!fixture.slot("active", "alpha").exists());

    fixture.log_step("Status reflects the manual records");
    let output = fixture.run("status", &[]);
    fixture.assert_success(&output, "status");
    let skills = output.json()["data"]["skills"].as_array().unwrap().clone();
    let record = |id: &str| {
        skills
            .iter()
            .find(|s| s["record"]["skill_id"] == id)
            .unwrap_or_else(|| panic!("no status for {id}"))
            .clone()
    };
    assert_eq!(record("alpha")["record"]["manual"], true);
    assert_eq!(record("alpha")["record"]["disposition"], "inactive");
    assert_eq!(record("bravo")["record"]["disposition"], "active");
    assert_eq!(record("bravo")["in_sync"], true);

    fixture.generate_report();
}

#[test]
fn test_manual_commands_reject_unknown_and_invalid_ids() {
    let mut fixture = E2EFixture::new("manual_bad_ids");

    let output = fixture.run("activate", &["--skill", "ghost"]);
    fixture.assert_exit(&output, 1, "activate ghost");
    assert_eq!(output.json()["status"]["error"]["code"], "SKILL_NOT_FOUND");

    let output = fixture.run("deactivate", &["--skill", "../escape"]);
    fixture.assert_exit(&output, 1, "deactivate ../escape");
    assert_eq!(output.json()["status"]["error"]["code"], "SKILL_INVALID_ID");
}

#[test]
fn test_manual_commands_take_repeated_skills() {
    let mut fixture = E2EFixture::new("manual_repeated_skills");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("bravo", WARNING_SKILL);
    fixture.pack.add_skill("echo", CLEAN_SKILL);
    fixture.pack.add_skill("delta", DANGER_SKILL);

    fixture.log_step("Initial sync");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync");

    fixture.log_step("Deactivate two skills in one command");
    let output = fixture.run("deactivate", &["--skill", "alpha", "--skill", "echo"]);
    fixture.assert_success(&output, "deactivate alpha echo");
    let outcomes = output.json()["data"]["outcomes"].as_array().unwrap().clone();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o["applied"] == true));
    assert!(fixture.slot("inactive", "alpha").is_dir());
    assert!(fixture.slot("inactive", "echo").is_dir());

    fixture.log_step("Allow-warnings activates clean and warning skills together");
    let output = fixture.run(
        "activate",
        &["--skill", "alpha", "--skill", "bravo", "--skill", "echo", "--allow-warnings"],
    );
    fixture.assert_success(&output, "activate --allow-warnings");
    let outcomes = output.json()["data"]["outcomes"].as_array().unwrap().clone();
    let ids: Vec<_> = outcomes.iter().map(|o| o["skill_id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["alpha", "bravo", "echo"]);
    assert!(outcomes.iter().all(|o| o["forced"] == false));
    assert_eq!(
        std::fs::read_to_string(fixture.slot("active", "bravo").join("SKILL.md")).unwrap(),
        WARNING_SKILL
    );

    fixture.log_step("Allow-warnings does not admit danger");
    let output = fixture.run("activate", &["--skill", "delta", "--allow-warnings"]);
    fixture.assert_exit(&output, 2, "activate delta --allow-warnings");
    assert_eq!(output.json()["status"]["error"]["code"], "ACTIVATION_BLOCKED");
    assert!(!fixture.slot("active", "delta").exists());

    fixture.log_step("One unknown id fails the command but not its neighbours");
    let output = fixture.run("deactivate", &["--skill", "alpha", "--skill", "ghost"]);
    fixture.assert_exit(&output, 1, "deactivate alpha ghost");
    assert_eq!(output.json()["status"]["error"]["code"], "SKILL_NOT_FOUND");
    assert!(fixture.slot("inactive", "alpha").is_dir());
    assert!(!fixture.slot("active", "alpha").exists());

    fixture.generate_report();
}

#[test]
fn test_placeholder_danger_keeps_content_quarantined() {
    let mut fixture = E2EFixture::new("placeholder_danger");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("delta", DANGER_SKILL);

    fixture.log_step("Sync with danger placeholders");
    let output = fixture.weekly_sync(&["--placeholder-danger"]);
    fixture.assert_success(&output, "weekly-sync --placeholder-danger");
    let report = output.report();
    assert_eq!(bundle(&report, "delta")["disposition"], "placeholder_quarantine");
    assert_eq!(bundle(&report, "delta")["lane"], "quarantine");
    assert_eq!(report["lane_outcome"]["all_contained"], true);
    assert_eq!(report["lane_outcome"]["dispositions"]["placeholder_quarantine"], 1);

    let active = fixture.slot("active", "delta");
    assert!(skillvet::lanes::placeholder::is_placeholder(&active));
    let placeholder = std::fs::read_to_string(active.join("SKILL.md")).unwrap();
    assert_ne!(placeholder, DANGER_SKILL);
    assert!(!placeholder.contains("mkfs"));
    assert_eq!(
        std::fs::read_to_string(fixture.slot("quarantine", "delta").join("SKILL.md")).unwrap(),
        DANGER_SKILL
    );
    assert!(!fixture.slot("inactive", "delta").exists());

    fixture.log_step("Second run is a no-op");
    let output = fixture.weekly_sync(&["--placeholder-danger"]);
    fixture.assert_success(&output, "second weekly-sync");
    assert_eq!(bundle(&output.report(), "delta")["operation"], "unchanged");

    fixture.log_step("Without the flag the placeholder is withdrawn");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync without flag");
    assert_eq!(bundle(&output.report(), "delta")["disposition"], "quarantine");
    assert!(!fixture.slot("active", "delta").exists());
    assert!(fixture.slot("quarantine", "delta").join("SKILL.md").is_file());

    fixture.generate_report();
}
