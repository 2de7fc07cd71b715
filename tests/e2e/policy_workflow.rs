//! E2E Scenario: allow/deny list policy
//!
//! Denylisted bundles are quarantined even when clean; a non-empty allowlist
//! keeps every unlisted bundle out of the active lane; conflicts resolve to
//! the denylist and are reported.

use skillvet::config::{ALLOWLIST_FILE, DENYLIST_FILE};
use skillvet::test_utils::fixtures::{CLEAN_SKILL, WARNING_SKILL};

use super::fixture::{E2EFixture, bundle};

#[test]
fn test_denylisted_clean_bundle_is_quarantined() {
    let mut fixture = E2EFixture::new("policy_denylist");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("charlie", CLEAN_SKILL);
    // Default location: <audit>/denylist.txt is picked up without a flag
    fixture.pack.write_list(DENYLIST_FILE, &["# reviewed 2026-10", "charlie"]);

    fixture.log_step("Sync with charlie denylisted");
    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync");
    let report = output.report();

    assert_eq!(
        std::fs::read_to_string(fixture.slot("quarantine", "charlie").join("SKILL.md")).unwrap(),
        CLEAN_SKILL
    );
    assert!(!fixture.slot("active", "charlie").exists());
    assert!(!fixture.slot("inactive", "charlie").exists());
    assert!(fixture.slot("active", "alpha").is_dir());

    let charlie = bundle(&report, "charlie");
    assert_eq!(charlie["overall_severity"], "clean");
    assert_eq!(charlie["reason"], "denylisted");
    assert_eq!(report["scan_verdict"]["status"], "SAFE");

    fixture.generate_report();
}

#[test]
fn test_allowlist_keeps_unlisted_bundles_out_of_active() {
    let mut fixture = E2EFixture::new("policy_allowlist");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("bravo", WARNING_SKILL);
    fixture.pack.add_skill("zulu", CLEAN_SKILL);
    let allow = fixture.pack.root.join("allow.txt");
    std::fs::write(&allow, "alpha\nbravo\n").unwrap();
    let allow = allow.to_string_lossy().into_owned();

    fixture.log_step("Sync with an allowlist naming alpha and bravo");
    let output = fixture.weekly_sync(&["--allowlist", &allow]);
    fixture.assert_success(&output, "weekly-sync --allowlist");
    let report = output.report();

    assert!(fixture.slot("active", "alpha").is_dir());
    assert!(!fixture.slot("active", "zulu").exists());
    assert!(fixture.slot("quarantine", "zulu").is_dir());
    assert_eq!(bundle(&report, "zulu")["reason"], "not_allowlisted");
    // Allowlisting does not bypass the scan
    assert_eq!(bundle(&report, "bravo")["disposition"], "placeholder_inactive");

    fixture.generate_report();
}

#[test]
fn test_conflicting_lists_resolve_to_denylist() {
    let mut fixture = E2EFixture::new("policy_conflict");
    fixture.pack.add_skill("alpha", CLEAN_SKILL);
    fixture.pack.add_skill("charlie", CLEAN_SKILL);
    fixture.pack.write_list(ALLOWLIST_FILE, &["alpha", "charlie"]);
    fixture.pack.write_list(DENYLIST_FILE, &["charlie"]);

    let output = fixture.weekly_sync(&[]);
    fixture.assert_success(&output, "weekly-sync");
    let report = output.report();

    assert_eq!(report["policy_conflicts"], serde_json::json!(["charlie"]));
    assert!(fixture.slot("quarantine", "charlie").is_dir());
    assert!(fixture.slot("active", "alpha").is_dir());

    fixture.generate_report();
}

#[test]
fn test_allow_warnings_promotes_warning_bundles() {
    let mut fixture = E2EFixture::new("policy_allow_warnings");
    fixture.pack.add_skill("bravo", WARNING_SKILL);

    let output = fixture.weekly_sync(&["--allow-warnings"]);
    fixture.assert_success(&output, "weekly-sync --allow-warnings");
    assert_eq!(
        std::fs::read_to_string(fixture.slot("active", "bravo").join("SKILL.md")).unwrap(),
        WARNING_SKILL
    );
    assert!(!fixture.slot("inactive", "bravo").exists());
    assert_eq!(bundle(&output.report(), "bravo")["reason"], "warnings_allowed");
}

#[test]
fn test_no_placeholder_warnings_leaves_active_slot_empty() {
    let mut fixture = E2EFixture::new("policy_no_placeholder");
    fixture.pack.add_skill("bravo", WARNING_SKILL);

    let output = fixture.weekly_sync(&["--no-placeholder-warnings"]);
    fixture.assert_success(&output, "weekly-sync --no-placeholder-warnings");
    assert!(fixture.slot("inactive", "bravo").join("SKILL.md").is_file());
    assert!(!fixture.slot("active", "bravo").exists());
    assert_eq!(bundle(&output.report(), "bravo")["disposition"], "inactive");
}
