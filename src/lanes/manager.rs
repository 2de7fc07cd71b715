//! Lane transitions.
//!
//! Every write goes through `<lane>/.staging/` and lands with a rename, so a
//! slot is either its old complete content or its new complete content.
//! Displaced slots are renamed into `<lane>/.trash/` (or the backup root)
//! before being deleted.

use std::io;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use super::lock::SkillLocks;
use super::placeholder;
use super::{Lane, LaneLayout, Placement, slot_exists};
use crate::core::bundle::{BundleMember, MemberContent};
use crate::core::policy::Disposition;
use crate::error::{Result, VetError};

/// Lists members that could not be copied into a lane.
pub const OMITTED_FILE: &str = ".skillvet-omitted";

/// Owns the lane directories and performs transitions.
#[derive(Debug)]
pub struct LaneManager {
    layout: LaneLayout,
    backup_root: Option<PathBuf>,
    locks: SkillLocks,
}

impl LaneManager {
    #[must_use]
    pub fn new(layout: LaneLayout, backup_root: Option<PathBuf>) -> Self {
        Self {
            layout,
            backup_root,
            locks: SkillLocks::new(),
        }
    }

    #[must_use]
    pub const fn layout(&self) -> &LaneLayout {
        &self.layout
    }

    #[must_use]
    pub fn placement(&self, skill_id: &str) -> Placement {
        Placement::observe(&self.layout, skill_id)
    }

    /// Create the lane directories and their work areas.
    pub fn ensure_layout(&self) -> Result<()> {
        for (lane, path) in self.layout.all() {
            for dir in [path.to_path_buf(), self.layout.staging_dir(lane), self.layout.trash_dir(lane)] {
                std::fs::create_dir_all(&dir).map_err(|e| VetError::LaneWrite {
                    skill_id: String::new(),
                    lane: lane.to_string(),
                    reason: format!("create {}: {e}", dir.display()),
                })?;
            }
        }
        Ok(())
    }

    /// Delete leftovers from interrupted runs. Returns the number of entries removed.
    pub fn sweep(&self) -> Result<usize> {
        let mut removed = 0;
        for lane in Lane::ALL {
            for dir in [self.layout.staging_dir(lane), self.layout.trash_dir(lane)] {
                if !dir.is_dir() {
                    continue;
                }
                for entry in std::fs::read_dir(&dir)? {
                    let path = entry?.path();
                    remove_any(&path)?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            info!(removed, "swept stale staging and trash entries");
        }
        Ok(removed)
    }

    /// Move a bundle's content into the lanes `disposition` calls for.
    ///
    /// `rule_ids` feed the placeholder when one is written.
    pub fn apply(
        &self,
        skill_id: &str,
        members: &[BundleMember],
        disposition: Disposition,
        rule_ids: &[String],
    ) -> Result<()> {
        self.locks.with_lock(skill_id, || -> Result<()> {
            match disposition {
                Disposition::Active => {
                    self.install(Lane::Active, skill_id, members)?;
                    self.remove(Lane::Inactive, skill_id)?;
                    self.remove(Lane::Quarantine, skill_id)?;
                    Ok(())
                }
                Disposition::PlaceholderInactive => {
                    self.install(Lane::Inactive, skill_id, members)?;
                    self.install(
                        Lane::Active,
                        skill_id,
                        &placeholder::members(skill_id, rule_ids),
                    )?;
                    self.remove(Lane::Quarantine, skill_id)?;
                    Ok(())
                }
                Disposition::Inactive => {
                    self.install(Lane::Inactive, skill_id, members)?;
                    self.remove(Lane::Active, skill_id)?;
                    self.remove(Lane::Quarantine, skill_id)?;
                    Ok(())
                }
                Disposition::PlaceholderQuarantine => {
                    self.install(Lane::Quarantine, skill_id, members)?;
                    self.remove(Lane::Inactive, skill_id)?;
                    self.install(
                        Lane::Active,
                        skill_id,
                        &placeholder::members(skill_id, rule_ids),
                    )?;
                    Ok(())
                }
                Disposition::Quarantine => {
                    self.install(Lane::Quarantine, skill_id, members)?;
                    self.remove(Lane::Active, skill_id)?;
                    self.remove(Lane::Inactive, skill_id)?;
                    Ok(())
                }
            }
        })
    }

    /// Replace the slot for `skill_id` in `lane` with `members`.
    pub fn install(&self, lane: Lane, skill_id: &str, members: &[BundleMember]) -> Result<()> {
        let err = lane_error(skill_id, lane);
        let staging = self.layout.staging_dir(lane);
        std::fs::create_dir_all(&staging).map_err(&err)?;

        let staged = tempfile::Builder::new()
            .prefix(&format!("{skill_id}."))
            .tempdir_in(&staging)
            .map_err(&err)?;
        write_members(staged.path(), members).map_err(&err)?;

        let slot = self.layout.slot(lane, skill_id);
        let displaced = if slot_exists(&slot) {
            Some(self.displace(lane, skill_id).map_err(&err)?)
        } else {
            None
        };

        if let Err(rename_err) = std::fs::rename(staged.path(), &slot) {
            if let Some(Displaced::Trash(previous)) = &displaced {
                if let Err(restore_err) = std::fs::rename(previous, &slot) {
                    warn!(skill_id, %lane, error = %restore_err, "could not restore displaced slot");
                }
            }
            return Err(err(rename_err));
        }
        let _ = staged.keep();

        if let Some(Displaced::Trash(previous)) = displaced {
            remove_any(&previous).map_err(&err)?;
        }
        debug!(skill_id, %lane, files = members.len(), "installed slot");
        Ok(())
    }

    /// Remove the slot for `skill_id` from `lane`. Returns whether anything was removed.
    pub fn remove(&self, lane: Lane, skill_id: &str) -> Result<bool> {
        let slot = self.layout.slot(lane, skill_id);
        if !slot_exists(&slot) {
            return Ok(false);
        }
        let err = lane_error(skill_id, lane);
        match self.displace(lane, skill_id).map_err(&err)? {
            Displaced::Trash(path) => remove_any(&path).map_err(&err)?,
            Displaced::Backup(path) => {
                debug!(skill_id, %lane, backup = %path.display(), "removed slot kept in backup");
            }
        }
        debug!(skill_id, %lane, "removed slot");
        Ok(true)
    }

    /// Rename the current slot out of the lane.
    fn displace(&self, lane: Lane, skill_id: &str) -> io::Result<Displaced> {
        let slot = self.layout.slot(lane, skill_id);
        if let Some(root) = &self.backup_root {
            let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
            let target = root.join(lane.as_str()).join(format!("{skill_id}_{stamp}"));
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            move_tree(&slot, &target)?;
            info!(skill_id, %lane, backup = %target.display(), "backed up displaced slot");
            return Ok(Displaced::Backup(target));
        }

        let trash = self.layout.trash_dir(lane);
        std::fs::create_dir_all(&trash)?;
        let target = trash.join(format!("{skill_id}.{}", Uuid::new_v4().simple()));
        std::fs::rename(&slot, &target)?;
        Ok(Displaced::Trash(target))
    }
}

enum Displaced {
    Trash(PathBuf),
    Backup(PathBuf),
}

fn lane_error(skill_id: &str, lane: Lane) -> impl Fn(io::Error) -> VetError + '_ {
    move |e| VetError::LaneWrite {
        skill_id: skill_id.to_string(),
        lane: lane.to_string(),
        reason: e.to_string(),
    }
}

fn write_members(dir: &Path, members: &[BundleMember]) -> io::Result<()> {
    let mut omitted = Vec::new();
    for member in members {
        let rel = safe_relative(&member.rel_path)?;
        let target = dir.join(rel);
        match &member.content {
            MemberContent::Text(text) => write_file(&target, text.as_bytes())?,
            MemberContent::Binary(bytes) => write_file(&target, bytes)?,
            MemberContent::Unreadable { reason } => {
                omitted.push(format!("{}\t{reason}", member.rel_path));
            }
        }
    }
    if !omitted.is_empty() {
        omitted.push(String::new());
        write_file(&dir.join(OMITTED_FILE), omitted.join("\n").as_bytes())?;
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)
}

/// Reject member paths that could escape the slot.
fn safe_relative(rel: &str) -> io::Result<&Path> {
    let path = Path::new(rel);
    let ok = !rel.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(path)
    } else {
        Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsafe member path: {rel}"),
        ))
    }
}

fn remove_any(path: &Path) -> io::Result<()> {
    let meta = std::fs::symlink_metadata(path)?;
    if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

/// Rename, falling back to copy and delete across filesystems.
fn move_tree(from: &Path, to: &Path) -> io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    remove_any(from)
}
