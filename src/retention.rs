//! Retention pruning for previously written bundles.
//!
//! Keeps the newest `retention_count` bundles in the destination and
//! deletes the rest. Only regular files matching the configured
//! `{zip_name}_*.zip` pattern are candidates; everything else in the
//! destination is left alone.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::config::BackupConfig;

/// Applies the retention policy and returns one history line per deletion
/// attempt. No-op when `retention_count` is 0.
///
/// Candidates are ordered by creation time, newest first; filesystems
/// without a birth time fall back to the modification time. A failed
/// deletion is logged and does not stop the remaining deletions.
pub fn apply(config: &BackupConfig) -> Vec<String> {
    let mut lines = Vec::new();
    if config.retention_count == 0 {
        return lines;
    }

    let destination = &config.destination;
    if !destination.is_dir() {
        tracing::warn!(
            "retention policy skipped: destination is not a directory: {}",
            destination.display()
        );
        return lines;
    }

    let prefix = format!("{}_", config.zip_name);
    let mut bundles: Vec<(PathBuf, String, SystemTime)> = Vec::new();
    let entries = match fs::read_dir(destination) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("retention policy skipped: cannot list destination: {e}");
            return lines;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        if !name.starts_with(&prefix) || !name.ends_with(".zip") {
            continue;
        }
        match bundle_time(&path) {
            Ok(time) => bundles.push((path, name, time)),
            Err(e) => {
                tracing::warn!("cannot read timestamps for {}: {e}", path.display());
            }
        }
    }

    bundles.sort_by(|a, b| b.2.cmp(&a.2));
    tracing::info!(
        "retention policy: keeping {} of {} bundles",
        config.retention_count.min(bundles.len()),
        bundles.len()
    );

    for (path, name, _) in bundles.into_iter().skip(config.retention_count) {
        match fs::remove_file(&path) {
            Ok(()) => {
                let line = format!("Retention policy: Deleted {name}");
                tracing::info!("{line}");
                lines.push(line);
            }
            Err(e) => {
                let line = format!("Retention policy: Failed to delete {name}: {e}");
                tracing::error!("{line}");
                lines.push(line);
            }
        }
    }
    lines
}

fn bundle_time(path: &std::path::Path) -> std::io::Result<SystemTime> {
    let metadata = fs::metadata(path)?;
    metadata.created().or_else(|_| metadata.modified())
}
