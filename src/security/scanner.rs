//! Pattern scanner.
//!
//! Applies a rule slice to every text member of a bundle. Content is only
//! ever matched against regular expressions; nothing is executed.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::rules::{MatchMode, Rule, RuleCategory, Severity, builtin_rules};
use crate::core::bundle::{ReadError, SkillBundle};
use crate::utils::format::{escape_excerpt, truncate_string};

/// Upper bound on excerpt length, in characters.
pub const MAX_EXCERPT_CHARS: usize = 160;

/// One rule match inside one bundle file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    pub category: RuleCategory,
    /// Relative to the bundle root.
    pub file_path: String,
    pub excerpt: String,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub escalated: bool,
}

/// Everything a scan learned about one bundle.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Sorted by file path, then rule id, then offset.
    pub findings: Vec<Finding>,
    pub skipped_file_count: usize,
    pub read_errors: Vec<ReadError>,
}

impl ScanOutcome {
    #[must_use]
    pub fn readable(&self) -> bool {
        self.read_errors.is_empty()
    }
}

/// Applies a set of rules to bundle content.
#[derive(Debug, Clone, Copy)]
pub struct Scanner<'r> {
    rules: &'r [Rule],
}

impl Default for Scanner<'static> {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Scanner<'static> {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }
}

impl<'r> Scanner<'r> {
    #[must_use]
    pub const fn with_rules(rules: &'r [Rule]) -> Self {
        Self { rules }
    }

    #[must_use]
    pub const fn rules(&self) -> &'r [Rule] {
        self.rules
    }

    /// Scan every text member; binary members are counted as skipped.
    #[must_use]
    pub fn scan(&self, bundle: &SkillBundle) -> ScanOutcome {
        let mut findings: Vec<Finding> = bundle
            .text_members()
            .flat_map(|(path, text)| self.scan_text(path, text))
            .collect();
        sort_findings(&mut findings);

        ScanOutcome {
            findings,
            skipped_file_count: bundle.binary_count(),
            read_errors: bundle.read_errors(),
        }
    }

    /// Scan one file's text. At most one finding per rule.
    #[must_use]
    pub fn scan_text(&self, file_path: &str, text: &str) -> Vec<Finding> {
        let mut findings: Vec<Finding> = self
            .rules
            .iter()
            .filter_map(|rule| match_rule(rule, file_path, text))
            .collect();
        sort_findings(&mut findings);
        findings
    }
}

fn match_rule(rule: &Rule, file_path: &str, text: &str) -> Option<Finding> {
    let (offset, excerpt) = match rule.mode {
        MatchMode::First => {
            let m = rule.regex().find(text)?;
            (m.start(), bounded_excerpt(m.as_str()))
        }
        MatchMode::Count => {
            let mut matches = rule.regex().find_iter(text);
            let first = matches.next()?;
            let count = 1 + matches.count();
            (first.start(), format!("count={count}"))
        }
        MatchMode::Base64Blob => {
            let m = rule
                .regex()
                .find_iter(text)
                .find(|m| is_base64_blob(m.as_str()))?;
            (m.start(), format!("len={}", m.as_str().len()))
        }
    };

    let (severity, escalated) = rule.severity_for(text);
    let (line, column) = line_and_column(text, offset);

    Some(Finding {
        rule_id: rule.id.clone(),
        severity,
        category: rule.category,
        file_path: file_path.to_string(),
        excerpt,
        line,
        column,
        offset,
        escalated,
    })
}

fn bounded_excerpt(matched: &str) -> String {
    truncate_string(&escape_excerpt(matched), MAX_EXCERPT_CHARS)
}

fn is_base64_blob(candidate: &str) -> bool {
    candidate.len() % 4 == 0
        && candidate.contains(['=', '+', '/'])
        && STANDARD.decode(candidate).is_ok()
}

/// 1-based line and character column of a byte offset.
fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
    let before = &text[..offset];
    let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// Deterministic order: file path, then rule id, then offset.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        a.file_path
            .cmp(&b.file_path)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
            .then_with(|| a.offset.cmp(&b.offset))
    });
}
