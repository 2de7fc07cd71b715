//! Context-aware error suggestions.
//!
//! Complements the static suggestions in the `codes` module with hints that
//! name the skill, path or lock holder involved.

use serde_json::Value;

use super::codes::ErrorCode;

/// Generate a context-aware suggestion for an error.
pub fn suggest_for_error(code: ErrorCode, context: Option<&Value>) -> String {
    match code {
        ErrorCode::SkillNotFound => suggest_skill_not_found(context),
        ErrorCode::SourceNotFound => suggest_source_not_found(context),
        ErrorCode::ActivationBlocked => suggest_activation_blocked(context),
        ErrorCode::LaneWriteFailed => suggest_lane_write_failed(context),
        ErrorCode::LockFailed => suggest_lock_failed(context),
        _ => code.suggestion().to_string(),
    }
}

fn context_str<'a>(context: Option<&'a Value>, key: &str) -> Option<&'a str> {
    context.and_then(|c| c.get(key)).and_then(Value::as_str)
}

fn suggest_skill_not_found(context: Option<&Value>) -> String {
    match context_str(context, "skill_id") {
        Some(id) => format!(
            "Skill '{id}' is not in any lane. Try:\n  - `skillvet status` to list known skills\n  - `skillvet weekly-sync --source <dir>` if '{id}' was added upstream"
        ),
        None => ErrorCode::SkillNotFound.suggestion().to_string(),
    }
}

fn suggest_source_not_found(context: Option<&Value>) -> String {
    match context_str(context, "path") {
        Some(path) => format!(
            "No directory at '{path}'. Fetch the upstream bundles first, then pass that directory to --source"
        ),
        None => ErrorCode::SourceNotFound.suggestion().to_string(),
    }
}

fn suggest_activation_blocked(context: Option<&Value>) -> String {
    match (context_str(context, "skill_id"), context_str(context, "reason")) {
        (Some(id), Some(reason)) => format!(
            "Activation of '{id}' was refused: {reason}\nReview the bundle, then rerun with `skillvet activate --skill {id} --force` if it is safe"
        ),
        _ => ErrorCode::ActivationBlocked.suggestion().to_string(),
    }
}

fn suggest_lane_write_failed(context: Option<&Value>) -> String {
    match context_str(context, "lane") {
        Some(lane) => format!(
            "Writing to the {lane} lane failed. Check its permissions and free space, then rerun the sync"
        ),
        None => ErrorCode::LaneWriteFailed.suggestion().to_string(),
    }
}

fn suggest_lock_failed(context: Option<&Value>) -> String {
    match context_str(context, "lock_path") {
        Some(path) => format!(
            "Lock '{path}' is held by another run. Wait for it to finish; delete the file only if no skillvet process is alive"
        ),
        None => ErrorCode::LockFailed.suggestion().to_string(),
    }
}
