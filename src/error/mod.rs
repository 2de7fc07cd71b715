//! Error handling for skillvet.
//!
//! This module provides:
//! - [`VetError`]: The main error enum for all skillvet operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestions and context

mod codes;
mod suggestions;

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;
pub use suggestions::suggest_for_error;

/// Main error type for skillvet operations.
///
/// Only configuration and environment failures escape a sync run. Per-bundle
/// read and lane failures are recorded in the run report instead.
#[derive(Error, Debug)]
pub enum VetError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Missing required config: {0}")]
    MissingConfig(String),

    #[error("Source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Skill not found: {0}")]
    SkillNotFound(String),

    #[error("Invalid skill id '{skill_id}': {reason}")]
    InvalidSkillId { skill_id: String, reason: String },

    #[error("Lane write failed for '{skill_id}' in {lane}: {reason}")]
    LaneWrite {
        skill_id: String,
        lane: String,
        reason: String,
    },

    #[error("State store error: {0}")]
    StateStore(String),

    #[error("Activation blocked for '{skill_id}': {reason}")]
    ActivationBlocked { skill_id: String, reason: String },

    #[error("Danger findings detected: {findings} finding(s) across {bundles} bundle(s)")]
    DangerDetected { bundles: usize, findings: usize },

    #[error("Lock failed on {}: {reason}", .path.display())]
    LockFailed { path: PathBuf, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VetError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) | Self::Serialization(_) => ErrorCode::SerializationError,
            Self::ConfigNotFound(_) => ErrorCode::ConfigNotFound,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingConfig(_) => ErrorCode::ConfigMissingRequired,
            Self::SourceNotFound(_) => ErrorCode::SourceNotFound,
            Self::SkillNotFound(_) => ErrorCode::SkillNotFound,
            Self::InvalidSkillId { .. } => ErrorCode::SkillInvalidId,
            Self::LaneWrite { .. } => ErrorCode::LaneWriteFailed,
            Self::StateStore(_) => ErrorCode::StateStoreError,
            Self::ActivationBlocked { .. } => ErrorCode::ActivationBlocked,
            Self::DangerDetected { .. } => ErrorCode::DangerDetected,
            Self::LockFailed { .. } => ErrorCode::LockFailed,
        }
    }

    /// Process exit code for this error.
    ///
    /// `2` signals a safety outcome the caller asked to fail on; every
    /// configuration or environment failure exits with `1`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::DangerDetected { .. } | Self::ActivationBlocked { .. } => 2,
            _ => 1,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::SkillNotFound(id) => Some(serde_json::json!({ "skill_id": id })),
            Self::SourceNotFound(path) => {
                Some(serde_json::json!({ "path": path.display().to_string() }))
            }
            Self::InvalidSkillId { skill_id, reason } => {
                Some(serde_json::json!({ "skill_id": skill_id, "reason": reason }))
            }
            Self::ConfigNotFound(path) => {
                Some(serde_json::json!({ "path": path.display().to_string() }))
            }
            Self::LockFailed { path, reason } => Some(serde_json::json!({
                "lock_path": path.display().to_string(),
                "reason": reason,
            })),
            Self::LaneWrite {
                skill_id,
                lane,
                reason,
            } => Some(serde_json::json!({ "skill_id": skill_id, "lane": lane, "reason": reason })),
            Self::ActivationBlocked { skill_id, reason } => {
                Some(serde_json::json!({ "skill_id": skill_id, "reason": reason }))
            }
            Self::DangerDetected { bundles, findings } => {
                Some(serde_json::json!({ "bundles": bundles, "findings": findings }))
            }
            Self::MissingConfig(key) => Some(serde_json::json!({ "config_key": key })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_vet_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
///
/// Emitted in robot mode so callers can branch on `code` instead of parsing
/// the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "SKILL_NOT_FOUND")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 101)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "skill", "config", "lock")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from a `VetError`.
    #[must_use]
    pub fn from_vet_error(err: &VetError) -> Self {
        let code = err.code();
        let context = err.context();
        let suggestion = suggest_for_error(code, context.as_ref());

        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion,
            context,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }

    /// Add context to this error.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self.suggestion = suggest_for_error(self.code, self.context.as_ref());
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&VetError> for StructuredError {
    fn from(err: &VetError) -> Self {
        Self::from_vet_error(err)
    }
}

/// Result type alias using `VetError`.
pub type Result<T> = std::result::Result<T, VetError>;
