use chrono::{DateTime, Utc};
use clap::ValueEnum;
use console::style;
use serde::Serialize;

use crate::error::{ErrorCode, Result, StructuredError, VetError};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable formatted output with colors (default)
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
    /// Plain text without colors or formatting
    Plain,
}

impl OutputFormat {
    #[must_use]
    pub const fn use_colors(&self) -> bool {
        matches!(self, Self::Human)
    }

    #[must_use]
    pub const fn is_machine_readable(&self) -> bool {
        matches!(self, Self::Json)
    }
}

#[derive(Serialize)]
pub struct RobotResponse<T> {
    pub status: RobotStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotStatus {
    Ok,
    /// Rich error with structured information
    #[serde(rename = "error")]
    StructuredError {
        /// Error code enum value (e.g., "SKILL_NOT_FOUND")
        code: ErrorCode,
        /// Numeric error code (e.g., 101)
        numeric_code: u16,
        message: String,
        /// Actionable suggestion for recovery
        suggestion: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<serde_json::Value>,
        recoverable: bool,
        /// Error category (e.g., "skill", "config")
        category: String,
        /// Exit code the process returns
        exit_code: u8,
    },
}

pub fn robot_ok<T: Serialize>(data: T) -> RobotResponse<T> {
    RobotResponse {
        status: RobotStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
        warnings: Vec::new(),
    }
}

/// Create a robot error response from a `VetError` with structured information.
pub fn robot_error_structured(err: &VetError) -> RobotResponse<serde_json::Value> {
    RobotResponse {
        status: err.into(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data: serde_json::Value::Null,
        warnings: Vec::new(),
    }
}

impl From<&VetError> for RobotStatus {
    fn from(err: &VetError) -> Self {
        let StructuredError {
            code,
            numeric_code,
            message,
            suggestion,
            context,
            recoverable,
            category,
        } = err.to_structured();
        Self::StructuredError {
            code,
            numeric_code,
            message,
            suggestion,
            context,
            recoverable,
            category,
            exit_code: err.exit_code(),
        }
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| VetError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
    plain: bool,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
            plain: false,
        }
    }

    /// Layout without ANSI styling.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 18,
            plain: true,
        }
    }

    #[must_use]
    pub const fn for_format(format: OutputFormat) -> Self {
        if format.use_colors() { Self::new() } else { Self::plain() }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        let line = if self.plain {
            text.to_string()
        } else {
            style(text).bold().to_string()
        };
        self.lines.push(line);
        self.lines.push(String::new());
        self
    }

    pub fn section(&mut self, text: &str) -> &mut Self {
        let line = if self.plain {
            text.to_string()
        } else {
            style(text).bold().to_string()
        };
        self.lines.push(line);
        self.lines.push("-".repeat(text.len().max(3)));
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        // Pad before styling so ANSI codes don't eat the width.
        let padded = format!("{key:width$}", width = self.key_width);
        let key_text = if self.plain {
            padded
        } else {
            style(padded).dim().to_string()
        };
        self.lines.push(format!("{key_text} {value}"));
        self
    }

    pub fn bullet(&mut self, text: &str) -> &mut Self {
        self.lines.push(format!("- {text}"));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}

/// Emit `value` as a robot envelope, or the human layout built by `human_fn`.
pub fn emit_output<T: Serialize>(
    value: &T,
    format: OutputFormat,
    human_fn: impl FnOnce(&T, &mut HumanLayout),
) -> Result<()> {
    if format.is_machine_readable() {
        return emit_json(&robot_ok(value));
    }
    let mut layout = HumanLayout::for_format(format);
    human_fn(value, &mut layout);
    emit_human(layout);
    Ok(())
}
