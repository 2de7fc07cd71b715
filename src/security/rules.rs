//! Declarative detection rules.
//!
//! Every rule is plain data in [`RULE_TABLE`]: an id, a severity tier, a
//! category and a regular expression. Patterns are compiled once, case
//! insensitive and multi-line. Adding a rule means adding a row; the scanner
//! has no per-rule branches.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Severity tier of a single rule or finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Review before importing.
    Warning,
    /// Never import without manual remediation.
    Danger,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    PromptInjection,
    DownloadExec,
    CodeExec,
    Obfuscation,
    Secrets,
    Destructive,
}

/// How a rule turns regex matches into a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// First match wins; the excerpt is the matched text.
    First,
    /// Every match is counted; the excerpt is `count=N`.
    Count,
    /// First match that decodes as base64; the excerpt is `len=N`.
    Base64Blob,
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct RuleDef {
    pub id: &'static str,
    pub severity: Severity,
    pub category: RuleCategory,
    pub description: &'static str,
    pub pattern: &'static str,
    pub mode: MatchMode,
    /// A match of this pattern anywhere in the same file raises the rule to danger.
    pub escalate_with: Option<&'static str>,
}

const fn rule(
    id: &'static str,
    severity: Severity,
    category: RuleCategory,
    description: &'static str,
    pattern: &'static str,
) -> RuleDef {
    RuleDef {
        id,
        severity,
        category,
        description,
        pattern,
        mode: MatchMode::First,
        escalate_with: None,
    }
}

const NETWORK_FETCH: &str = r"\b(?:curl|wget|urlopen|Invoke-WebRequest|iwr|axios)\b|\brequests\.(?:get|post)\s*\(|\burllib\.request\b|\bhttp\.client\b|\bfetch\s*\(";

use RuleCategory::{CodeExec, Destructive, DownloadExec, Obfuscation, PromptInjection, Secrets};
use Severity::{Danger, Warning};

/// Built-in detection rules.
pub const RULE_TABLE: &[RuleDef] = &[
    // Prompt injection
    rule(
        "INJECT_IGNORE_PREVIOUS",
        Danger,
        PromptInjection,
        "Attempts to override earlier instructions",
        r"\b(?:ignore|disregard|forget)\b[^\n]{0,60}\b(?:previous|prior|earlier)\b[^\n]{0,40}\b(?:instructions|rules|system|developer)\b",
    ),
    rule(
        "INJECT_SYSTEM_OVERRIDE",
        Danger,
        PromptInjection,
        "Claims a system or developer override",
        r"\bsystem\s+override\b|\bdeveloper\s+override\b|\boverride\s+(?:all\s+)?(?:policies|safety|rules)\b",
    ),
    rule(
        "INJECT_REVEAL_SYSTEM_PROMPT",
        Warning,
        PromptInjection,
        "Asks to reveal hidden instructions",
        r"\b(?:reveal|show|print|leak)\b[^\n]{0,40}\b(?:system\s+prompt|developer\s+message|hidden\s+instructions)\b",
    ),
    rule(
        "INJECT_JAILBREAK_KEYWORDS",
        Warning,
        PromptInjection,
        "Jailbreak vocabulary",
        r"\b(?:jailbreak|do\s+anything\s+now|DAN\b|unfiltered|uncensored|no\s+restrictions)\b",
    ),
    // Download and execute
    rule(
        "CURL_PIPE_SHELL",
        Danger,
        DownloadExec,
        "curl output piped to a shell",
        r"\bcurl\b[^\n]{0,200}\|\s*(?:sudo\s+)?(?:bash|sh|zsh)\b",
    ),
    rule(
        "WGET_PIPE_SHELL",
        Danger,
        DownloadExec,
        "wget output piped to a shell",
        r"\bwget\b[^\n]{0,200}\|\s*(?:sudo\s+)?(?:bash|sh|zsh)\b",
    ),
    rule(
        "DOWNLOAD_PIPE_INTERPRETER",
        Danger,
        DownloadExec,
        "Download piped straight into an interpreter",
        r"\b(?:curl|wget)\b[^\n]{0,200}\|\s*(?:sudo\s+)?(?:python3?|perl|ruby|node|fish|ksh|dash|pwsh|powershell)\b",
    ),
    rule(
        "SHELL_REMOTE_SUBSTITUTION",
        Danger,
        DownloadExec,
        "Shell evaluates a download through substitution",
        r#"\b(?:bash|sh|zsh|source)\s+<\(\s*(?:curl|wget)\b|\b(?:bash|sh|zsh)\s+-c\s+["']?\$\(\s*(?:curl|wget)\b"#,
    ),
    rule(
        "POWERSHELL_IEX_DOWNLOAD",
        Danger,
        DownloadExec,
        "PowerShell download fed to Invoke-Expression",
        r"\b(?:powershell|pwsh)\b[^\n]{0,250}\b(?:iex|invoke-expression)\b[^\n]{0,250}\b(?:iwr|wget|invoke-webrequest|downloadstring)\b",
    ),
    rule(
        "REMOTE_DOWNLOAD_EXEC",
        Warning,
        DownloadExec,
        "Script downloaded to disk and then run",
        r"\b(?:curl|wget)\b[^\n|]{0,200}(?:\s-o\b|--output\b|>)[^\n|]{0,160}(?:&&|;)\s*(?:sudo\s+)?(?:bash|sh|zsh|chmod\s+\+x|\./)",
    ),
    // Code execution
    rule(
        "CODE_EVAL",
        Danger,
        CodeExec,
        "Dynamic code evaluation",
        r"\beval\s*\(|\bexec\s*\(|\bnew\s+Function\s*\(",
    ),
    RuleDef {
        escalate_with: Some(NETWORK_FETCH),
        ..rule(
            "OS_COMMAND",
            Warning,
            CodeExec,
            "Direct OS command invocation",
            r"\bos\.(?:system|popen)\s*\(|\bsubprocess\.(?:Popen|call|run|check_output|check_call)\s*\(|\bchild_process\b|\bRuntime\.getRuntime\(\)\.exec\b|\bshell_exec\s*\(|\bpassthru\s*\(",
        )
    },
    // Obfuscation
    rule(
        "BASE64_EXEC",
        Danger,
        Obfuscation,
        "Base64 payload decoded and executed",
        r"\bbase64\s+(?:-d|-D|--decode)\b[^\n]{0,80}\|\s*(?:sudo\s+)?(?:bash|sh|zsh|python3?|perl)\b|\b(?:exec|eval)\s*\(\s*(?:base64\.b64decode|atob|Buffer\.from)\b|\bFromBase64String\b[^\n]{0,200}\b(?:iex|Invoke-Expression)\b|\b(?:iex|Invoke-Expression)\b[^\n]{0,200}\bFromBase64String\b",
    ),
    rule(
        "BASE64_DECODE",
        Warning,
        Obfuscation,
        "Base64 decoding",
        r"\bbase64\.(?:b64decode|decodebytes)\b|\bFromBase64String\b|\batob\s*\(|\bbase64\s+(?:-d|--decode)\b|\bcertutil\s+-decode\b",
    ),
    rule(
        "POWERSHELL_ENCODED",
        Warning,
        Obfuscation,
        "PowerShell encoded command",
        r"(?:^|\s)-enc(?:odedcommand)?\s+[A-Za-z0-9+/=]{20,}",
    ),
    RuleDef {
        mode: MatchMode::Count,
        ..rule(
            "OBFUSCATION_ZERO_WIDTH",
            Warning,
            Obfuscation,
            "Zero-width or bidirectional control characters",
            r"[\x{200B}-\x{200F}\x{202A}-\x{202E}\x{2060}-\x{206F}\x{FEFF}]",
        )
    },
    RuleDef {
        mode: MatchMode::Base64Blob,
        ..rule(
            "OBFUSCATION_BASE64_BLOB",
            Warning,
            Obfuscation,
            "Long base64 blob",
            r"[A-Za-z0-9+/=]{200,}",
        )
    },
    // Secrets
    rule(
        "SECRET_ENV_REFERENCE",
        Warning,
        Secrets,
        "Well-known secret environment variable",
        r"\b(?:AWS_SECRET_ACCESS_KEY|AWS_ACCESS_KEY_ID|AWS_SESSION_TOKEN|GITHUB_TOKEN|GH_TOKEN|GITLAB_TOKEN|NPM_TOKEN|OPENAI_API_KEY|ANTHROPIC_API_KEY|GOOGLE_APPLICATION_CREDENTIALS|AZURE_CLIENT_SECRET|SLACK_BOT_TOKEN|STRIPE_SECRET_KEY|HF_TOKEN)\b",
    ),
    rule(
        "PRIVATE_KEY_PATH",
        Warning,
        Secrets,
        "Private key or credential file path",
        r"\.ssh/(?:id_(?:rsa|dsa|ecdsa|ed25519)\b|authorized_keys\b)|\.aws/credentials\b|\.gnupg/|\.kube/config\b|-----BEGIN (?:RSA |DSA |EC |OPENSSH |PGP )?PRIVATE KEY",
    ),
    // Destructive
    rule(
        "RM_RF_ROOT",
        Danger,
        Destructive,
        "Recursive delete of the root or home directory",
        r"\brm\s+-(?:rf|fr)\s+(?:--no-preserve-root\s+)?(?:/|~/?)\*?(?:\s|$)",
    ),
    rule(
        "DISK_FORMAT",
        Danger,
        Destructive,
        "Disk format or filesystem creation",
        r"\bformat\s+[A-Z]:|\bmkfs\.\w+|\bmkfs\b|\bwipefs\b",
    ),
    rule(
        "DD_WIPE",
        Danger,
        Destructive,
        "Device overwrite",
        r"\bdd\s+if=/dev/(?:zero|u?random)\b|\bshred\b",
    ),
];

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub severity: Severity,
    pub category: RuleCategory,
    pub description: String,
    pub mode: MatchMode,
    regex: Regex,
    escalate: Option<Regex>,
}

impl Rule {
    /// Compile a table row.
    pub fn compile(def: &RuleDef) -> Result<Self, regex::Error> {
        let mut rule = Self::new(def.id, def.severity, def.category, def.description, def.pattern)?
            .with_mode(def.mode);
        if let Some(pattern) = def.escalate_with {
            rule = rule.escalate_when(pattern)?;
        }
        Ok(rule)
    }

    /// Build a custom rule.
    pub fn new(
        id: impl Into<String>,
        severity: Severity,
        category: RuleCategory,
        description: impl Into<String>,
        pattern: &str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            id: id.into(),
            severity,
            category,
            description: description.into(),
            mode: MatchMode::First,
            regex: build_regex(pattern)?,
            escalate: None,
        })
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Raise this rule to danger when `pattern` also matches the same file.
    pub fn escalate_when(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.escalate = Some(build_regex(pattern)?);
        Ok(self)
    }

    #[must_use]
    pub const fn regex(&self) -> &Regex {
        &self.regex
    }

    /// Severity this rule reports for a file with the given content.
    #[must_use]
    pub fn severity_for(&self, text: &str) -> (Severity, bool) {
        match &self.escalate {
            Some(escalate) if self.severity < Severity::Danger && escalate.is_match(text) => {
                (Severity::Danger, true)
            }
            _ => (self.severity, false),
        }
    }
}

fn build_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
}

static BUILTIN_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    RULE_TABLE
        .iter()
        .map(|def| Rule::compile(def).expect("invalid builtin rule pattern"))
        .collect()
});

/// The compiled built-in rule set.
pub fn builtin_rules() -> &'static [Rule] {
    &BUILTIN_RULES
}

/// Look up a built-in rule by id.
pub fn rule_by_id(id: &str) -> Option<&'static Rule> {
    builtin_rules().iter().find(|rule| rule.id == id)
}
