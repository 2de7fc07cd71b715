//! Verdict classification and rule frequency.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::bundle::ReadError;
use crate::security::rules::Severity;
use crate::security::scanner::{Finding, ScanOutcome};

/// Overall severity of one bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallSeverity {
    Clean,
    Warning,
    Danger,
    /// The bundle could not be fully read.
    Error,
}

impl OverallSeverity {
    pub const ALL: [Self; 4] = [Self::Clean, Self::Warning, Self::Danger, Self::Error];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Warning => "warning",
            Self::Danger => "danger",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for OverallSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce findings to one severity.
///
/// `error` when unreadable, then `danger`, then `warning`, else `clean`.
#[must_use]
pub fn classify(findings: &[Finding], readable: bool) -> OverallSeverity {
    if !readable {
        return OverallSeverity::Error;
    }
    match findings.iter().map(|f| f.severity).max() {
        Some(Severity::Danger) => OverallSeverity::Danger,
        Some(Severity::Warning) => OverallSeverity::Warning,
        None => OverallSeverity::Clean,
    }
}

/// Scan result for one bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub skill_id: String,
    pub overall_severity: OverallSeverity,
    pub findings: Vec<Finding>,
    pub skipped_file_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read_errors: Vec<ReadError>,
}

impl Verdict {
    #[must_use]
    pub fn from_outcome(skill_id: &str, outcome: ScanOutcome) -> Self {
        let overall_severity = classify(&outcome.findings, outcome.readable());
        Self {
            skill_id: skill_id.to_string(),
            overall_severity,
            findings: outcome.findings,
            skipped_file_count: outcome.skipped_file_count,
            read_errors: outcome.read_errors,
        }
    }

    /// Distinct rule ids, sorted.
    #[must_use]
    pub fn rule_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.findings.iter().map(|f| f.rule_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    #[must_use]
    pub fn danger_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.severity == Severity::Danger)
    }
}

/// Trigger count for one rule across a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCount {
    pub rule_id: String,
    pub count: usize,
}

/// Per-rule trigger frequency, most frequent first, ties by rule id.
///
/// Independent of the order verdicts arrive in.
#[must_use]
pub fn rule_frequency<'a>(verdicts: impl IntoIterator<Item = &'a Verdict>) -> Vec<RuleCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for verdict in verdicts {
        for finding in &verdict.findings {
            *counts.entry(finding.rule_id.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<RuleCount> = counts
        .into_iter()
        .map(|(rule_id, count)| RuleCount {
            rule_id: rule_id.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.rule_id.cmp(&b.rule_id)));
    ranked
}
