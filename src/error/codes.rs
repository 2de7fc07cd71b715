//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Skill errors
//! - 3xx: Config errors
//! - 6xx: Storage errors
//! - 8xx: Security errors
//! - 85x: Lock errors
//! - 9xx: Internal errors (I/O)

use serde::{Deserialize, Serialize};

/// Standardized error codes for robot mode output.
///
/// Each variant maps to a numeric code (e.g., `SkillNotFound` -> E101).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Skill errors (1xx)
    // ========================================
    /// E101: No lane or state record holds the requested skill
    SkillNotFound,
    /// E102: Skill id is not a safe single path component
    SkillInvalidId,

    // ========================================
    // Config errors (3xx)
    // ========================================
    /// E301: Explicit config file does not exist
    ConfigNotFound,
    /// E302: Config file or flag has invalid syntax or values
    ConfigInvalid,
    /// E304: Required config value is missing
    ConfigMissingRequired,
    /// E305: Source directory does not exist
    SourceNotFound,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E605: Serialization/deserialization failed
    SerializationError,
    /// E606: A lane move or rename failed
    LaneWriteFailed,
    /// E607: Sync state file could not be written
    StateStoreError,

    // ========================================
    // Security errors (8xx)
    // ========================================
    /// E802: Manual activation refused by the safety gate
    ActivationBlocked,
    /// E803: Danger-tier content found while fail-on-danger was requested
    DangerDetected,

    // ========================================
    // Lock errors (85x)
    // ========================================
    /// E852: Another run holds the lane lock
    LockFailed,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E906: IO operation failed
    IoError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `SkillNotFound` -> 101).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::SkillNotFound => 101,
            Self::SkillInvalidId => 102,

            Self::ConfigNotFound => 301,
            Self::ConfigInvalid => 302,
            Self::ConfigMissingRequired => 304,
            Self::SourceNotFound => 305,

            Self::SerializationError => 605,
            Self::LaneWriteFailed => 606,
            Self::StateStoreError => 607,

            Self::ActivationBlocked => 802,
            Self::DangerDetected => 803,

            Self::LockFailed => 852,

            Self::IoError => 906,
        }
    }

    /// Get the error code as a formatted string (e.g., "E101").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::SkillNotFound => "Run `skillvet status` to list known skills and their lanes",
            Self::SkillInvalidId => "Skill ids may only contain letters, digits, '.', '_' and '-' and must not start with '.'",

            Self::ConfigNotFound => "Create ~/.config/skillvet/config.toml or pass --config <path>",
            Self::ConfigInvalid => "Check TOML syntax in the config file and the values of SKILLVET_* variables",
            Self::ConfigMissingRequired => "Pass the missing path on the command line or set it in the config file",
            Self::SourceNotFound => "Point --source at the directory that holds the upstream skill bundles",

            Self::SerializationError => "The data format may be corrupted. Check input data for validity",
            Self::LaneWriteFailed => "Check write permissions on the lane directories, then rerun the sync",
            Self::StateStoreError => "Check write permissions on the audit directory. The next run will rescan everything",

            Self::ActivationBlocked => "Review the bundle and the latest report. Pass --force to activate anyway",
            Self::DangerDetected => "Open the verdict file and review every danger finding before using the pack",

            Self::LockFailed => "Another skillvet run is active. Wait for it to finish or remove a stale lock file",

            Self::IoError => "File operation failed. Check path exists and permissions are correct",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::SkillNotFound
            | Self::SkillInvalidId
            | Self::ConfigNotFound
            | Self::ConfigInvalid
            | Self::ConfigMissingRequired
            | Self::SourceNotFound
            | Self::LaneWriteFailed
            | Self::StateStoreError
            | Self::ActivationBlocked
            | Self::DangerDetected
            | Self::LockFailed
            | Self::IoError => true,

            Self::SerializationError => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        let numeric = self.numeric();
        if numeric >= 850 && numeric < 900 {
            return "lock";
        }
        match numeric / 100 {
            1 => "skill",
            3 => "config",
            6 => "storage",
            8 => "security",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::SkillNotFound,
            Self::SkillInvalidId,
            Self::ConfigNotFound,
            Self::ConfigInvalid,
            Self::ConfigMissingRequired,
            Self::SourceNotFound,
            Self::SerializationError,
            Self::LaneWriteFailed,
            Self::StateStoreError,
            Self::ActivationBlocked,
            Self::DangerDetected,
            Self::LockFailed,
            Self::IoError,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
