//! Core bundle types and decisions

pub mod bundle;
pub mod policy;
pub mod verdict;

pub use bundle::{BundleMember, MemberContent, SkillBundle, discover, validate_skill_id};
pub use policy::{DecideOptions, Decision, DecisionReason, Disposition, PolicyAction, PolicyLists, decide};
pub use verdict::{OverallSeverity, RuleCount, Verdict, classify, rule_frequency};
