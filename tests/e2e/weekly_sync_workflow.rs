//! E2E Scenario: weekly sync
//!
//! Clean, warning and danger bundles flow into their lanes; reruns are
//! idempotent, `--new-only` skips unchanged bundles and dry runs leave
//! every lane and the state file untouched.

use skillvet::config::{STATE_FILE, SYNC_REPORT_FILE, SYNC_VERDICT_FILE};
use skillvet::test_utils::fixtures::{CLEAN_SKILL, DANGER_SKILL, WARNING_SKILL};

use super::fixture::{E2EFixture, bundle};

#[test]
fn test_clean_warning_and_danger_bundles_land_in_their_lanes() {
    let mut fixture = E2EFixture::new("weekly_sync_lanes");

    fixture.log_step("Create alpha (clean), bravo (warning), delta (danger)");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.write_member("alpha", "scripts/notes.txt", b"tidy up\n");
    fixture.pack.add_skill("bravo", WARNING_SKILL);
    fixture.pack.add_skill("delta", DANGER_SKILL);

    fixture.log_step("Run weekly-sync");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync");
    let report = output.report();

    // alpha: active with original content only
    assert_eq!(
        std::fs::read_to_string(fixture.slot("active", "alpha").join("SKILL.md")).unwrap(),
        CLEAN_SKILL
    );
    assert!(fixture.slot("active", "alpha").join("scripts/notes.txt").is_file());
    assert!(!fixture.slot("inactive", "alpha").exists());
    assert!(!fixture.slot("quarantine", "alpha").exists());

    // bravo: real content inactive, placeholder active without excerpts
    assert_eq!(
        std::fs::read_to_string(fixture.slot("inactive", "bravo").join("SKILL.md")).unwrap(),
        WARNING_SKILL
    );
    let placeholder =
        std::fs::read_to_string(fixture.slot("active", "bravo").join("SKILL.md")).unwrap();
    assert!(placeholder.contains("withheld"));
    assert!(placeholder.contains("REMOTE_DOWNLOAD_EXEC"));
    assert!(!placeholder.contains("example.com"));
    assert!(!fixture.slot("quarantine", "bravo").exists());

    // delta: quarantine only
    assert!(fixture.slot("quarantine", "delta").join("SKILL.md").is_file());
    assert!(!fixture.slot("active", "delta").exists());
    assert!(!fixture.slot("inactive", "delta").exists());

    fixture.log_step("Check report counts and danger list");
    assert_eq!(report["summary"]["by_severity"]["clean"], 1);
    assert_eq!(report["summary"]["by_severity"]["warning"], 1);
    assert_eq!(report["summary"]["by_severity"]["danger"], 1);
    assert_eq!(report["scan_verdict"]["status"], "DO NOT USE");
    assert_eq!(report["scan_verdict"]["passed"], false);
    assert_eq!(report["lane_outcome"]["all_contained"], true);
    let danger = report["danger_findings"].as_array().unwrap();
    assert!(
        danger
            .iter()
            .any(|d| d["skill_id"] == "delta" && d["rule_id"] == "DISK_FORMAT")
    );
    assert_eq!(bundle(&report, "bravo")["disposition"], "placeholder_inactive");

    fixture.log_step("Check artifacts on disk");
    let audit = fixture.pack.audit_dir();
    let on_disk = fixture.read_json(&audit.join(SYNC_REPORT_FILE));
    assert_eq!(on_disk["summary"], report["summary"]);
    let verdict = std::fs::read_to_string(audit.join(SYNC_VERDICT_FILE)).unwrap();
    assert!(verdict.contains("DO NOT USE"));
    assert!(verdict.contains("DISK_FORMAT"));
    assert!(audit.join(STATE_FILE).is_file());

    fixture.generate_report();
}

#[test]
fn test_second_run_is_idempotent() {
    let mut fixture = E2EFixture::new("weekly_sync_idempotent");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("bravo", WARNING_SKILL);
    fixture.pack.add_skill("delta", DANGER_SKILL);

    fixture.log_step("First run");
    let first = fixture.weekly_sync(&[]);
    fixture.assert_success(&first, "first weekly-sync");
    let lanes_after_first = without_state(fixture.snapshot());

    fixture.log_step("Second run with nothing changed");
    let second = fixture.weekly_sync(&[]);
    fixture.assert_success(&second, "second weekly-sync");
    let lanes_after_second = without_state(fixture.snapshot());

    assert_eq!(lanes_after_first, lanes_after_second);
    let (a, b) = (first.report(), second.report());
    assert_eq!(a["summary"]["by_severity"], b["summary"]["by_severity"]);
    assert_eq!(a["top_rules"], b["top_rules"]);
    assert_eq!(a["lane_outcome"]["dispositions"], b["lane_outcome"]["dispositions"]);
    assert_eq!(b["lane_outcome"]["operations"]["unchanged"], 3);
    assert_eq!(b["summary"]["unchanged"], 3);

    fixture.generate_report();
}

#[test]
fn test_new_only_after_unchanged_source_processes_nothing() {
    let mut fixture = E2EFixture::new("weekly_sync_new_only");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);

    fixture.log_step("Initial sync");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync");

    fixture.log_step("--new-only with no source changes");
    let output = fixture.weekly_sync(&["--new-only"]);
    fixture.assert_success(&output, "weekly-sync --new-only");
    let report = output.report();
    assert_eq!(report["summary"]["processed"], 0);
    assert_eq!(report["summary"]["new"], 0);
    assert_eq!(report["summary"]["changed"], 0);
    assert_eq!(report["summary"]["skipped_unchanged"], 1);

    fixture.log_step("--new-only picks up an edited bundle");
    fixture.pack.add_skill("alpha", "# Formatter v2\n");
    let output = fixture.weekly_sync(&["--new-only"]);
    fixture.assert_success(&output, "weekly-sync --new-only");
    let report = output.report();
    assert_eq!(report["summary"]["changed"], 1);
    assert_eq!(
        std::fs::read_to_string(fixture.slot("active", "alpha").join("SKILL.md")).unwrap(),
        "# Formatter v2\n"
    );

    fixture.generate_report();
}

#[test]
fn test_dry_run_leaves_lanes_and_state_untouched() {
    let mut fixture = E2EFixture::new("weekly_sync_dry_run");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("delta", DANGER_SKILL);

    fixture.log_step("Real run to populate lanes and state");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync");

    fixture.log_step("Change the source, then dry run");
    fixture.pack.add_skill("alpha", DANGER_SKILL);
    fixture.pack.add_skill("echo", CLEAN_SKILL);
    let before = fixture.snapshot();
    let output = fixture.weekly_sync(&["--dry-run"]);
    fixture.assert_success(&output, "weekly-sync --dry-run");
    assert_eq!(before, fixture.snapshot());

    let report = output.report();
    assert_eq!(report["meta"]["dry_run"], true);
    assert_eq!(bundle(&report, "alpha")["operation"], "planned");
    assert_eq!(bundle(&report, "alpha")["disposition"], "quarantine");
    let audit = fixture.pack.audit_dir();
    assert!(audit.join("WEEKLY_SYNC_REPORT.dry-run.json").is_file());
    assert!(audit.join("WEEKLY_SYNC_VERDICT.dry-run.md").is_file());

    fixture.generate_report();
}

#[test]
fn test_fail_on_danger_exits_two_after_quarantining() {
    let mut fixture = E2EFixture::new("weekly_sync_fail_on_danger");
    fixture.pack.add_skill("delta", DANGER_SKILL);

    let output = fixture.weekly_sync(&["--fail-on-danger"]);
    fixture.assert_exit(&output, 2, "weekly-sync --fail-on-danger");
    let doc = output.json();
    assert_eq!(doc["status"]["error"]["code"], "DANGER_DETECTED");
    assert_eq!(doc["status"]["error"]["exit_code"], 2);

    // Containment still happened and the report was still written
    assert!(fixture.slot("quarantine", "delta").is_dir());
    assert!(fixture.pack.audit_dir().join(SYNC_REPORT_FILE).is_file());

    fixture.log_step("Without the flag danger is not a process failure");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync");

    fixture.generate_report();
}

#[test]
fn test_missing_source_is_a_configuration_failure() {
    let mut fixture = E2EFixture::new("weekly_sync_missing_source");
    let missing = fixture.pack.root.join("nowhere").to_string_lossy().into_owned();
    let output = fixture.run("weekly-sync", &["--source", &missing]);
    fixture.assert_exit(&output, 1, "weekly-sync on missing source");
    let doc = output.json();
    assert_eq!(doc["status"]["error"]["code"], "SOURCE_NOT_FOUND");
    assert!(!fixture.pack.layout().active.exists());
}

fn without_state(
    mut snapshot: std::collections::BTreeMap<String, Vec<u8>>,
) -> std::collections::BTreeMap<String, Vec<u8>> {
    snapshot.remove("STATE");
    snapshot
}

