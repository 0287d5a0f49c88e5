//! Filesystem-permission preflight.
//!
//! Before any archival work is committed, the engine checks that the
//! destination is writable and that sources look readable, so the common
//! misconfigurations fail fast and cheaply. The check is advisory: a path
//! that passes here can still vanish or change mode before the archive
//! step, which then reports it as a per-item warning instead.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SourceEntry;

/// Issue count at which the check stops and appends a truncation marker.
const MAX_ISSUES: usize = 10;
/// Levels below a folder root the sampling walk descends into.
const SAMPLE_DEPTH: usize = 2;
/// Files inspected for readability per visited directory.
const SAMPLE_FILES_PER_DIR: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    NoWrite,
    NoRead,
    NoTraverse,
    AccessError,
}

/// One permission problem found during preflight.
#[derive(Debug, Clone)]
pub struct PermissionIssue {
    pub kind: IssueKind,
    pub path: PathBuf,
    message: String,
}

impl PermissionIssue {
    fn new(kind: IssueKind, path: &Path, message: String) -> Self {
        Self {
            kind,
            path: path.to_path_buf(),
            message,
        }
    }
}

impl fmt::Display for PermissionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Checks write access on the destination and read/traverse access on all
/// configured sources. Never fails; returns a possibly empty issue list.
///
/// Folder sources get a bounded sampling walk rather than a full scan:
/// at most [`SAMPLE_DEPTH`] levels below the root, at most
/// [`SAMPLE_FILES_PER_DIR`] files inspected per directory, at most one
/// unreadable file reported per directory.
pub fn check(
    destination: &Path,
    files: &[SourceEntry],
    folders: &[SourceEntry],
) -> Vec<PermissionIssue> {
    let mut issues = Vec::new();

    if destination.exists() {
        if !writable(destination) {
            issues.push(PermissionIssue::new(
                IssueKind::NoWrite,
                destination,
                format!(
                    "No write permission for destination folder: {}",
                    destination.display()
                ),
            ));
        }
    } else {
        let parent = destination.parent().unwrap_or(Path::new("/"));
        if !writable(parent) {
            issues.push(PermissionIssue::new(
                IssueKind::NoWrite,
                parent,
                format!(
                    "Cannot create destination folder: no write permission for {}",
                    parent.display()
                ),
            ));
        }
    }

    for entry in files {
        if entry.path.exists() && !readable(&entry.path) {
            issues.push(PermissionIssue::new(
                IssueKind::NoRead,
                &entry.path,
                format!("No read permission for file: {}", entry.path.display()),
            ));
        }
    }

    for entry in folders {
        let root = &entry.path;
        if !root.exists() {
            continue;
        }
        if !readable(root) {
            issues.push(PermissionIssue::new(
                IssueKind::NoRead,
                root,
                format!("No read permission for folder: {}", root.display()),
            ));
        }
        if !traversable(root) {
            issues.push(PermissionIssue::new(
                IssueKind::NoTraverse,
                root,
                format!("No traverse permission for folder: {}", root.display()),
            ));
        }
        if sample_dir(root, root, 0, &mut issues) {
            break;
        }
    }

    issues
}

/// Visits one directory of the sampling walk. Returns `true` once the
/// issue cap is reached and the truncation marker has been appended.
fn sample_dir(root: &Path, dir: &Path, depth: usize, issues: &mut Vec<PermissionIssue>) -> bool {
    if issues.len() > MAX_ISSUES {
        issues.push(PermissionIssue::new(
            IssueKind::AccessError,
            root,
            "Multiple permission issues found. Showing first 10 only.".to_string(),
        ));
        return true;
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            issues.push(PermissionIssue::new(
                IssueKind::AccessError,
                dir,
                format!("Error accessing subfolder in {}: {e}", root.display()),
            ));
            return false;
        }
    };

    let mut inspected = 0;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
            continue;
        }
        if inspected >= SAMPLE_FILES_PER_DIR {
            continue;
        }
        inspected += 1;
        if !readable(&path) {
            issues.push(PermissionIssue::new(
                IssueKind::NoRead,
                &path,
                format!("No read permission for file in subfolder: {}", path.display()),
            ));
            // One report per directory is enough to flag it.
            break;
        }
    }

    if depth < SAMPLE_DEPTH {
        for sub in subdirs {
            if sample_dir(root, &sub, depth + 1, issues) {
                return true;
            }
        }
    }
    false
}

pub(crate) fn readable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        has_access(path, libc::R_OK)
    }
    #[cfg(not(unix))]
    {
        if path.is_dir() {
            fs::read_dir(path).is_ok()
        } else {
            fs::File::open(path).is_ok()
        }
    }
}

pub(crate) fn writable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        has_access(path, libc::W_OK)
    }
    #[cfg(not(unix))]
    {
        fs::metadata(path)
            .map(|m| !m.permissions().readonly())
            .unwrap_or(false)
    }
}

pub(crate) fn traversable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        has_access(path, libc::X_OK)
    }
    #[cfg(not(unix))]
    {
        fs::read_dir(path).is_ok()
    }
}

#[cfg(unix)]
fn has_access(path: &Path, mode: libc::c_int) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // Safety: access(2) with a valid NUL-terminated path.
    unsafe { libc::access(c_path.as_ptr(), mode) == 0 }
}
