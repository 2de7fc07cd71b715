//! Static content scanning.
//!
//! - [`rules`]: the declarative rule table
//! - [`scanner`]: applies rules to bundle members and produces findings

pub mod rules;
pub mod scanner;

pub use rules::{MatchMode, Rule, RuleCategory, RuleDef, Severity, builtin_rules};
pub use scanner::{Finding, ScanOutcome, Scanner};
