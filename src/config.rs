use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, VetError};
use crate::lanes::LaneLayout;
use crate::utils::fs::expand_tilde;

/// Default per-file read limit for bundle members.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 8 * 1024 * 1024;

/// Default number of rules listed in "top offending rules".
pub const DEFAULT_TOP_RULES: usize = 10;

pub const ALLOWLIST_FILE: &str = "allowlist.txt";
pub const DENYLIST_FILE: &str = "denylist.txt";
pub const STATE_FILE: &str = "skill_vet_state.json";
pub const SYNC_REPORT_FILE: &str = "WEEKLY_SYNC_REPORT.json";
pub const SYNC_VERDICT_FILE: &str = "WEEKLY_SYNC_VERDICT.md";
pub const SCAN_REPORT_FILE: &str = "SCAN_REPORT.json";
pub const SCAN_VERDICT_FILE: &str = "SCAN_VERDICT.md";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lanes: LanesConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load defaults, then the config file, then `SKILLVET_*` overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(explicit_path, &|key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an injectable environment lookup.
    pub fn load_with_env(explicit_path: Option<&Path>, env: EnvLookup<'_>) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| env("SKILLVET_CONFIG").map(PathBuf::from));

        if let Some(path) = explicit {
            match Self::load_patch(&path)? {
                Some(patch) => config.merge_patch(patch),
                None => {
                    return Err(VetError::ConfigNotFound(path));
                }
            }
        } else if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }

        config.apply_env_overrides(env)?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        match dirs::config_dir() {
            Some(dir) => Self::load_patch(&dir.join("skillvet/config.toml")),
            None => Ok(None),
        }
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| VetError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| VetError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.lanes {
            self.lanes.merge(patch);
        }
        if let Some(patch) = patch.policy {
            self.policy.merge(patch);
        }
        if let Some(patch) = patch.scan {
            self.scan.merge(patch);
        }
        if let Some(patch) = patch.sync {
            self.sync.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self, env: EnvLookup<'_>) -> Result<()> {
        if let Some(value) = env_string(env, "SKILLVET_ACTIVE") {
            self.lanes.active = value;
        }
        if let Some(value) = env_string(env, "SKILLVET_INACTIVE") {
            self.lanes.inactive = value;
        }
        if let Some(value) = env_string(env, "SKILLVET_QUARANTINE") {
            self.lanes.quarantine = value;
        }
        if let Some(value) = env_string(env, "SKILLVET_AUDIT_DIR") {
            self.lanes.audit = Some(value);
        }

        if let Some(value) = env_string(env, "SKILLVET_ALLOWLIST") {
            self.policy.allowlist = Some(value);
        }
        if let Some(value) = env_string(env, "SKILLVET_DENYLIST") {
            self.policy.denylist = Some(value);
        }

        if let Some(value) = env_usize(env, "SKILLVET_WORKERS")? {
            self.scan.workers = value;
        }
        if let Some(value) = env_u64(env, "SKILLVET_MAX_FILE_BYTES")? {
            if value == 0 {
                return Err(VetError::Config(
                    "invalid SKILLVET_MAX_FILE_BYTES value 0: must be positive".to_string(),
                ));
            }
            self.scan.max_file_bytes = value;
        }

        if let Some(value) = env_bool(env, "SKILLVET_ALLOW_WARNINGS") {
            self.sync.allow_warnings = value;
        }
        if let Some(value) = env_bool(env, "SKILLVET_PLACEHOLDER_DANGER") {
            self.sync.placeholder_danger = value;
        }
        if let Some(value) = env_bool(env, "SKILLVET_FAIL_ON_DANGER") {
            self.sync.fail_on_danger = value;
        }

        Ok(())
    }

    /// Lane directories with `~` expanded.
    #[must_use]
    pub fn layout(&self) -> LaneLayout {
        LaneLayout::new(
            expand_tilde(&self.lanes.active),
            expand_tilde(&self.lanes.inactive),
            expand_tilde(&self.lanes.quarantine),
        )
    }

    /// Audit directory: configured, or `<active>-audit` beside the active lane.
    #[must_use]
    pub fn audit_dir(&self) -> PathBuf {
        match &self.lanes.audit {
            Some(audit) => expand_tilde(audit),
            None => default_audit_dir(&expand_tilde(&self.lanes.active)),
        }
    }
}

/// Environment lookup used for `SKILLVET_*` overrides.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Sibling of the active lane named `<active>-audit`.
#[must_use]
pub fn default_audit_dir(active: &Path) -> PathBuf {
    match (active.parent(), active.file_name()) {
        (Some(parent), Some(name)) => {
            parent.join(format!("{}-audit", name.to_string_lossy()))
        }
        _ => PathBuf::from("skillvet-audit"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanesConfig {
    #[serde(default)]
    pub active: String,
    #[serde(default)]
    pub inactive: String,
    #[serde(default)]
    pub quarantine: String,
    #[serde(default)]
    pub audit: Option<String>,
}

impl Default for LanesConfig {
    fn default() -> Self {
        Self {
            active: "~/.agent/skills".to_string(),
            inactive: "~/.agent/skills-inactive".to_string(),
            quarantine: "~/.agent/skills-quarantine".to_string(),
            audit: None,
        }
    }
}

impl LanesConfig {
    fn merge(&mut self, patch: LanesPatch) {
        if let Some(value) = patch.active {
            self.active = value;
        }
        if let Some(value) = patch.inactive {
            self.inactive = value;
        }
        if let Some(value) = patch.quarantine {
            self.quarantine = value;
        }
        if let Some(value) = patch.audit {
            self.audit = Some(value);
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub allowlist: Option<String>,
    #[serde(default)]
    pub denylist: Option<String>,
}

impl PolicyConfig {
    fn merge(&mut self, patch: PolicyPatch) {
        if let Some(value) = patch.allowlist {
            self.allowlist = Some(value);
        }
        if let Some(value) = patch.denylist {
            self.denylist = Some(value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Members larger than this are recorded as unreadable.
    #[serde(default)]
    pub max_file_bytes: u64,
    /// Worker threads; `0` means one per CPU.
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub top_rules: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            workers: 0,
            top_rules: DEFAULT_TOP_RULES,
        }
    }
}

impl ScanConfig {
    fn merge(&mut self, patch: ScanPatch) {
        if let Some(value) = patch.max_file_bytes {
            self.max_file_bytes = value;
        }
        if let Some(value) = patch.workers {
            self.workers = value;
        }
        if let Some(value) = patch.top_rules {
            self.top_rules = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub allow_warnings: bool,
    /// Write placeholders into the active lane for warning-level bundles.
    #[serde(default)]
    pub placeholder_warnings: bool,
    /// Write placeholders into the active lane for danger-level bundles.
    #[serde(default)]
    pub placeholder_danger: bool,
    #[serde(default)]
    pub fail_on_danger: bool,
    #[serde(default)]
    pub backup_root: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            allow_warnings: false,
            placeholder_warnings: true,
            placeholder_danger: false,
            fail_on_danger: false,
            backup_root: None,
        }
    }
}

impl SyncConfig {
    fn merge(&mut self, patch: SyncPatch) {
        if let Some(value) = patch.allow_warnings {
            self.allow_warnings = value;
        }
        if let Some(value) = patch.placeholder_warnings {
            self.placeholder_warnings = value;
        }
        if let Some(value) = patch.placeholder_danger {
            self.placeholder_danger = value;
        }
        if let Some(value) = patch.fail_on_danger {
            self.fail_on_danger = value;
        }
        if let Some(value) = patch.backup_root {
            self.backup_root = Some(value);
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub lanes: Option<LanesPatch>,
    pub policy: Option<PolicyPatch>,
    pub scan: Option<ScanPatch>,
    pub sync: Option<SyncPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct LanesPatch {
    pub active: Option<String>,
    pub inactive: Option<String>,
    pub quarantine: Option<String>,
    pub audit: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PolicyPatch {
    pub allowlist: Option<String>,
    pub denylist: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ScanPatch {
    pub max_file_bytes: Option<u64>,
    pub workers: Option<usize>,
    pub top_rules: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SyncPatch {
    pub allow_warnings: Option<bool>,
    pub placeholder_warnings: Option<bool>,
    pub placeholder_danger: Option<bool>,
    pub fail_on_danger: Option<bool>,
    pub backup_root: Option<String>,
}

fn env_string(env: EnvLookup<'_>, key: &str) -> Option<String> {
    env(key).filter(|value| !value.trim().is_empty())
}

fn env_bool(env: EnvLookup<'_>, key: &str) -> Option<bool> {
    env(key).map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_usize(env: EnvLookup<'_>, key: &str) -> Result<Option<usize>> {
    match env(key) {
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|err| VetError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

fn env_u64(env: EnvLookup<'_>, key: &str) -> Result<Option<u64>> {
    match env(key) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| VetError::Config(format!("invalid {key} value {value}: {err}"))),
        None => Ok(None),
    }
}

// =============================================================================
// RUN CONFIGURATION
// =============================================================================

/// Every option a sync or scan run recognizes, resolved to concrete values.
///
/// Built from [`Config`] by [`RunConfig::from_config`]; command-line flags
/// then overwrite individual fields.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    /// Directory holding one folder per upstream bundle. Required.
    pub source: PathBuf,
    /// Active, inactive and quarantine lane directories.
    /// Default: `~/.agent/skills`, `~/.agent/skills-inactive`, `~/.agent/skills-quarantine`.
    pub layout: LaneLayout,
    /// Where state, reports and the run lock live. Default: `<active>-audit`.
    pub audit_dir: PathBuf,
    /// Denylist file. Default: `<audit>/denylist.txt` when it exists.
    pub denylist_path: Option<PathBuf>,
    /// Allowlist file. Default: `<audit>/allowlist.txt` when it exists.
    pub allowlist_path: Option<PathBuf>,
    /// Persisted sync state. Default: `<audit>/skill_vet_state.json`.
    pub state_path: PathBuf,
    /// JSON report. Default: `<audit>/WEEKLY_SYNC_REPORT.json` (`.dry-run.json` in dry runs).
    pub report_path: Option<PathBuf>,
    /// Markdown verdict. Default: `<audit>/WEEKLY_SYNC_VERDICT.md` (`.dry-run.md` in dry runs).
    pub verdict_path: Option<PathBuf>,
    /// Displaced lane entries are moved here instead of deleted. Default: none.
    pub backup_root: Option<PathBuf>,
    /// Compute and report only. Default: false.
    pub dry_run: bool,
    /// Process only new or changed bundles. Default: false.
    pub new_only: bool,
    /// Warning-level bundles go to the active lane. Default: false.
    pub allow_warnings: bool,
    /// Warning-level bundles go to inactive with no active placeholder. Default: false.
    pub suppress_placeholder_warnings: bool,
    /// Danger-level bundles also get an active placeholder. Default: false.
    pub placeholder_danger: bool,
    /// Return a failure exit code when danger findings exist. Default: false.
    pub fail_on_danger: bool,
    /// Worker threads, `0` for one per CPU. Default: 0.
    pub workers: usize,
    /// Per-member read limit. Default: 8 MiB.
    pub max_file_bytes: u64,
    /// Length of the top offending rules list. Default: 10.
    pub top_rules: usize,
}

impl RunConfig {
    #[must_use]
    pub fn from_config(source: PathBuf, config: &Config) -> Self {
        let audit_dir = config.audit_dir();
        let allowlist_path = resolve_policy_path(config.policy.allowlist.as_deref(), &audit_dir, ALLOWLIST_FILE);
        let denylist_path = resolve_policy_path(config.policy.denylist.as_deref(), &audit_dir, DENYLIST_FILE);
        Self {
            source,
            layout: config.layout(),
            state_path: audit_dir.join(STATE_FILE),
            audit_dir,
            denylist_path,
            allowlist_path,
            report_path: None,
            verdict_path: None,
            backup_root: config.sync.backup_root.as_deref().map(expand_tilde),
            dry_run: false,
            new_only: false,
            allow_warnings: config.sync.allow_warnings,
            suppress_placeholder_warnings: !config.sync.placeholder_warnings,
            placeholder_danger: config.sync.placeholder_danger,
            fail_on_danger: config.sync.fail_on_danger,
            workers: config.scan.workers,
            max_file_bytes: config.scan.max_file_bytes,
            top_rules: config.scan.top_rules,
        }
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| self.default_artifact(SYNC_REPORT_FILE))
    }

    #[must_use]
    pub fn verdict_path(&self) -> PathBuf {
        self.verdict_path
            .clone()
            .unwrap_or_else(|| self.default_artifact(SYNC_VERDICT_FILE))
    }

    fn default_artifact(&self, file_name: &str) -> PathBuf {
        let path = self.audit_dir.join(file_name);
        if self.dry_run { dry_run_path(&path) } else { path }
    }

    /// Effective worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        } else {
            self.workers
        }
    }

    /// Reject inputs that would make the run meaningless.
    pub fn validate(&self) -> Result<()> {
        if !self.source.is_dir() {
            return Err(VetError::SourceNotFound(self.source.clone()));
        }
        if self.max_file_bytes == 0 {
            return Err(VetError::Config("max_file_bytes must be positive".to_string()));
        }
        let lanes = self.layout.all();
        for (idx, (lane, path)) in lanes.iter().enumerate() {
            if path.as_os_str().is_empty() {
                return Err(VetError::MissingConfig(format!("{lane} lane path")));
            }
            for (other_lane, other) in lanes.iter().skip(idx + 1) {
                if path == other {
                    return Err(VetError::Config(format!(
                        "{lane} and {other_lane} lanes share the path {}",
                        path.display()
                    )));
                }
            }
            if self.source.as_path() == *path {
                return Err(VetError::Config(format!(
                    "source directory is the {lane} lane: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// `WEEKLY_SYNC_REPORT.json` becomes `WEEKLY_SYNC_REPORT.dry-run.json`.
#[must_use]
pub fn dry_run_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.dry-run.{}", ext.to_string_lossy()),
        None => format!("{stem}.dry-run"),
    };
    path.with_file_name(name)
}

fn resolve_policy_path(configured: Option<&str>, audit_dir: &Path, default_name: &str) -> Option<PathBuf> {
    match configured {
        Some(path) => {
            let path = expand_tilde(path);
            if !path.exists() {
                warn!(path = %path.display(), "configured policy list does not exist; treating as empty");
            }
            Some(path)
        }
        None => existing(audit_dir.join(default_name)),
    }
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.exists().then_some(path)
}
