//! Run and per-skill serialization.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, VetError};

pub const LOCK_FILE: &str = "skillvet.lock";

/// Who holds the run lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    pub hostname: String,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

/// Advisory exclusive lock on `<audit>/skillvet.lock`.
///
/// Held for the duration of any lane-mutating run. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Try to take the lock without waiting.
    pub fn try_acquire(audit_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(audit_dir)?;
        let path = audit_dir.join(LOCK_FILE);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| VetError::LockFailed {
                path: path.clone(),
                reason: format!("open lock file: {e}"),
            })?;

        if let Err(err) = file.try_lock_exclusive() {
            let holder = Self::status(audit_dir)
                .map(|h| format!(" (held by pid {} on {} since {})", h.pid, h.hostname, h.acquired_at))
                .unwrap_or_default();
            return Err(VetError::LockFailed {
                reason: format!("another skillvet run holds the lock{holder}: {err}"),
                path,
            });
        }

        let holder = serde_json::to_string(&LockHolder::current())?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(holder.as_bytes())?;
        file.flush()?;

        debug!(path = %path.display(), "acquired run lock");
        Ok(Self { file, path })
    }

    /// Current holder, or `None` when nobody holds the lock.
    #[must_use]
    pub fn status(audit_dir: &Path) -> Option<LockHolder> {
        let path = audit_dir.join(LOCK_FILE);
        let file = File::open(&path).ok()?;
        if file.try_lock_exclusive().is_ok() {
            let _ = FileExt::unlock(&file);
            return None;
        }
        let raw = std::fs::read_to_string(&path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("failed to release run lock: {e}");
        }
        debug!(path = %self.path.display(), "released run lock");
    }
}

/// In-process mutex per skill id.
#[derive(Debug, Default)]
pub struct SkillLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SkillLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `skill_id`.
    pub fn with_lock<R>(&self, skill_id: &str, f: impl FnOnce() -> R) -> R {
        let lock = {
            let mut map = self.inner.lock();
            Arc::clone(map.entry(skill_id.to_string()).or_default())
        };
        let _guard = lock.lock();
        f()
    }
}
