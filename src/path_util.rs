//! Path-safety validation for configured sources and the destination.
//!
//! Configured paths end up in archive names and filesystem operations, so
//! anything that could smuggle traversal or shell metacharacters into a
//! downstream tool is rejected outright at configuration-update time.

use std::path::{Component, Path};

use thiserror::Error;

/// Characters that are never legitimate in a configured backup path.
const SUSPICIOUS: [char; 7] = ['~', '$', '|', ';', '>', '<', '&'];

/// Reason a path was rejected by [`validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathRejection {
    #[error("path contains parent-directory traversal")]
    Traversal,
    #[error("only absolute paths are allowed")]
    NotAbsolute,
    #[error("path contains shell metacharacters")]
    SuspiciousCharacters,
}

/// Validates a raw path string before it is accepted into the
/// configuration. Pure; touches no filesystem state.
///
/// Rejects paths with a `..` component, relative paths, and paths
/// containing any of `~ $ | ; > < &` in the raw string.
pub fn validate(raw: &str) -> Result<(), PathRejection> {
    let path = Path::new(raw);
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(PathRejection::Traversal);
    }
    if !path.is_absolute() {
        return Err(PathRejection::NotAbsolute);
    }
    if raw.contains(SUSPICIOUS) {
        return Err(PathRejection::SuspiciousCharacters);
    }
    Ok(())
}
