//! Skill bundle discovery and reading.
//!
//! A bundle is read exactly once. The bytes held in [`BundleMember`] are the
//! bytes that get scanned and, later, the bytes installed into a lane.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, VetError};

/// File that marks a directory as a skill bundle.
pub const SKILL_FILE: &str = "SKILL.md";

/// Directory names never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[".git", "__pycache__", "node_modules", ".venv", "venv", ".disabled"];

const BINARY_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "ico", "bmp", "tif", "tiff", "svgz", "pdf", "zip", "gz",
    "tgz", "bz2", "xz", "zst", "7z", "tar", "rar", "jar", "war", "whl", "woff", "woff2", "ttf",
    "otf", "eot", "mp3", "mp4", "m4a", "wav", "ogg", "flac", "mov", "avi", "mkv", "webm", "so",
    "dylib", "dll", "exe", "bin", "o", "a", "class", "pyc", "pyo", "wasm", "sqlite", "db", "doc",
    "docx", "xls", "xlsx", "ppt", "pptx",
];

/// Root-level names owned by the lane writer. A source bundle may not carry them.
pub const RESERVED_FILES: &[&str] = &[".skillvet-placeholder", ".skillvet-omitted"];

const SNIFF_BYTES: usize = 8 * 1024;
const UNREADABLE_MARKER: &[u8] = b"<UNREADABLE>";

static SKILL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("skill id regex"));

/// Check that `id` is usable as a single path component in every lane.
pub fn validate_skill_id(id: &str) -> Result<()> {
    if SKILL_ID_RE.is_match(id) && id != "." && id != ".." {
        return Ok(());
    }
    Err(VetError::InvalidSkillId {
        skill_id: id.to_string(),
        reason: "must match [A-Za-z0-9][A-Za-z0-9._-]{0,127}".to_string(),
    })
}

/// How a member file was classified when read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberContent {
    Text(String),
    Binary(Vec<u8>),
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleMember {
    /// Path relative to the bundle root, `/`-separated.
    pub rel_path: String,
    pub content: MemberContent,
}

impl BundleMember {
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.content {
            MemberContent::Text(text) => Some(text.as_bytes()),
            MemberContent::Binary(bytes) => Some(bytes),
            MemberContent::Unreadable { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_binary(&self) -> bool {
        matches!(self.content, MemberContent::Binary(_))
    }
}

/// A member that could not be read, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadError {
    pub file_path: String,
    pub reason: String,
}

/// An immutable, fully-read skill bundle.
#[derive(Debug, Clone)]
pub struct SkillBundle {
    pub id: String,
    pub root_path: PathBuf,
    /// Sorted by relative path.
    pub members: Vec<BundleMember>,
    pub content_hash: String,
}

impl SkillBundle {
    /// Read every member under `root`.
    ///
    /// Never fails: members that cannot be read are kept as
    /// [`MemberContent::Unreadable`] and the bundle verdict becomes `error`.
    #[must_use]
    pub fn read(root: &Path, id: &str, max_file_bytes: u64) -> Self {
        let mut members = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !(entry.file_type().is_dir()
                        && EXCLUDED_DIRS.contains(&&*entry.file_name().to_string_lossy()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let rel_path = err
                        .path()
                        .and_then(|path| path.strip_prefix(root).ok())
                        .map_or_else(|| ".".to_string(), rel_string);
                    warn!(skill_id = id, path = %rel_path, error = %err, "walk error");
                    members.push(BundleMember {
                        rel_path,
                        content: MemberContent::Unreadable {
                            reason: err.to_string(),
                        },
                    });
                    continue;
                }
            };
            if entry.depth() == 0 || entry.file_type().is_dir() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let rel_path = rel_string(rel);
            let content = if entry.path_is_symlink() {
                MemberContent::Unreadable {
                    reason: "symbolic link not followed".to_string(),
                }
            } else if entry.depth() == 1 && RESERVED_FILES.contains(&rel_path.as_str()) {
                MemberContent::Unreadable {
                    reason: "reserved file name".to_string(),
                }
            } else {
                read_member(entry.path(), max_file_bytes)
            };
            if let MemberContent::Unreadable { reason } = &content {
                debug!(skill_id = id, path = %rel_path, reason = %reason, "member unreadable");
            }
            members.push(BundleMember { rel_path, content });
        }

        members.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
        let content_hash = content_hash(&members);

        Self {
            id: id.to_string(),
            root_path: root.to_path_buf(),
            members,
            content_hash,
        }
    }

    /// True when every member was read.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.read_errors().is_empty()
    }

    #[must_use]
    pub fn read_errors(&self) -> Vec<ReadError> {
        self.members
            .iter()
            .filter_map(|member| match &member.content {
                MemberContent::Unreadable { reason } => Some(ReadError {
                    file_path: member.rel_path.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn binary_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_binary()).count()
    }

    #[must_use]
    pub fn text_members(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().filter_map(|member| match &member.content {
            MemberContent::Text(text) => Some((member.rel_path.as_str(), text.as_str())),
            _ => None,
        })
    }
}

fn rel_string(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_member(path: &Path, max_file_bytes: u64) -> MemberContent {
    let size = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) => return MemberContent::Unreadable { reason: err.to_string() },
    };
    if size > max_file_bytes {
        return MemberContent::Unreadable {
            reason: format!("file exceeds {max_file_bytes} bytes ({size} bytes)"),
        };
    }

    let mut bytes = Vec::new();
    let read = std::fs::File::open(path)
        .and_then(|file| file.take(max_file_bytes + 1).read_to_end(&mut bytes));
    if let Err(err) = read {
        return MemberContent::Unreadable { reason: err.to_string() };
    }
    if bytes.len() as u64 > max_file_bytes {
        return MemberContent::Unreadable {
            reason: format!("file exceeds {max_file_bytes} bytes"),
        };
    }

    if has_binary_extension(path) || looks_binary(&bytes) {
        return MemberContent::Binary(bytes);
    }

    match String::from_utf8(bytes) {
        Ok(text) => MemberContent::Text(text),
        Err(_) => MemberContent::Unreadable {
            reason: "invalid UTF-8".to_string(),
        },
    }
}

fn has_binary_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| BINARY_EXTENSIONS.contains(&ext.as_str()))
}

/// NUL in the first 8 KiB, or more than 30% control bytes.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(SNIFF_BYTES)];
    if head.is_empty() {
        return false;
    }
    if head.contains(&0) {
        return true;
    }
    let control = head
        .iter()
        .filter(|&&b| (b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0c)) || b == 0x7f)
        .count();
    control * 10 > head.len() * 3
}

/// SHA-256 over sorted members: path, NUL, bytes (or a marker), NUL.
pub fn content_hash(members: &[BundleMember]) -> String {
    let mut sorted: Vec<&BundleMember> = members.iter().collect();
    sorted.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));

    let mut hasher = Sha256::new();
    for member in sorted {
        hasher.update(member.rel_path.as_bytes());
        hasher.update([0u8]);
        hasher.update(member.bytes().unwrap_or(UNREADABLE_MARKER));
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}

// =============================================================================
// DISCOVERY
// =============================================================================

/// A source child that was not treated as a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredEntry {
    pub name: String,
    pub reason: String,
}

/// Result of listing a source directory.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Bundle ids, sorted.
    pub ids: Vec<String>,
    pub ignored: Vec<IgnoredEntry>,
}

/// List bundle ids under `source`.
pub fn discover(source: &Path) -> Result<Discovery> {
    if !source.is_dir() {
        return Err(VetError::SourceNotFound(source.to_path_buf()));
    }

    let mut discovery = Discovery::default();
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        if validate_skill_id(&name).is_err() {
            warn!(name = %name, "ignoring source folder with invalid skill id");
            discovery.ignored.push(IgnoredEntry {
                name,
                reason: "invalid skill id".to_string(),
            });
            continue;
        }
        if !entry.path().join(SKILL_FILE).is_file() {
            debug!(name = %name, "ignoring source folder without {SKILL_FILE}");
            discovery.ignored.push(IgnoredEntry {
                name,
                reason: format!("no {SKILL_FILE}"),
            });
            continue;
        }
        discovery.ids.push(name);
    }

    discovery.ids.sort();
    discovery.ignored.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(discovery)
}
