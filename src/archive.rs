//! Bundle construction.
//!
//! Walks the configured sources and writes one timestamped zip bundle into
//! the destination. Individual unreadable or vanished sources become
//! warnings and the run keeps going; only a destination that cannot be
//! created or an archive that cannot be opened/finalized fails the run.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use chrono::Local;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::config::BackupConfig;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of one backup run. Produced once, never mutated afterward.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub success: bool,
    pub zip_filename: String,
    pub size_mb: f64,
    pub files_processed: usize,
    pub warnings: Vec<String>,
    /// Wall-clock time the run started, `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
}

impl RunReport {
    /// History line for this run.
    pub fn history_line(&self) -> String {
        if self.success {
            format!(
                "{} - {:.2} MB - {} files",
                self.zip_filename, self.size_mb, self.files_processed
            )
        } else {
            format!("{} - FAILED", self.zip_filename)
        }
    }

    pub(crate) fn failed(zip_filename: String, warnings: Vec<String>, timestamp: String) -> Self {
        Self {
            success: false,
            zip_filename,
            size_mb: 0.0,
            files_processed: 0,
            warnings,
            timestamp,
        }
    }
}

/// Builds one bundle from the configured sources.
///
/// The archive is named `{zip_name}_{YYYY-MM-DD_HH-MM-SS}.zip` with the
/// timestamp taken at build start. Folder entries are stored under
/// `{folder basename}/{relative path}`, file entries under their base
/// name.
pub fn build(config: &BackupConfig) -> RunReport {
    let started = Local::now();
    let timestamp = started.format("%Y-%m-%d %H:%M:%S").to_string();
    let zip_filename = format!(
        "{}_{}.zip",
        config.zip_name,
        started.format("%Y-%m-%d_%H-%M-%S")
    );
    let zip_path = config.destination.join(&zip_filename);

    if !config.destination.exists() {
        if let Err(e) = fs::create_dir_all(&config.destination) {
            let msg = format!("Failed to create destination directory: {e}");
            tracing::error!("{msg}");
            return RunReport::failed(zip_filename, vec![msg], timestamp);
        }
        tracing::info!(
            "created destination directory: {}",
            config.destination.display()
        );
    }

    tracing::info!("starting backup: {zip_filename}");

    let mut warnings = Vec::new();
    let mut files_processed = 0usize;
    let fatal = match write_bundle(&zip_path, config, &mut warnings, &mut files_processed) {
        Ok(()) => false,
        Err(e) => {
            let msg = format!("Failed to create zip file: {e}");
            tracing::error!("{msg}");
            warnings.push(msg);
            true
        }
    };

    let success = !fatal && zip_path.is_file();
    let size_mb = if success {
        fs::metadata(&zip_path)
            .map(|m| m.len() as f64 / BYTES_PER_MB)
            .unwrap_or(0.0)
    } else {
        0.0
    };

    let report = RunReport {
        success,
        zip_filename,
        size_mb,
        files_processed,
        warnings,
        timestamp,
    };
    if report.success {
        tracing::info!("backup completed: {}", report.history_line());
    } else {
        tracing::error!("backup failed: {}", report.zip_filename);
    }
    report
}

/// Writes all configured sources into the archive at `zip_path`.
///
/// Per-item failures are appended to `warnings` and processing continues;
/// only opening or finalizing the archive itself is fatal.
fn write_bundle(
    zip_path: &Path,
    config: &BackupConfig,
    warnings: &mut Vec<String>,
    files_processed: &mut usize,
) -> anyhow::Result<()> {
    let file = File::create(zip_path)?;
    let mut zip = ZipWriter::new(file);

    for folder in &config.folders {
        let root = &folder.path;
        if !root.exists() {
            let msg = format!("Missing folder: {}", root.display());
            tracing::warn!("{msg}");
            warnings.push(msg);
            continue;
        }
        let base = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let msg = format!("Error processing folder {}: {e}", root.display());
                    tracing::warn!("{msg}");
                    warnings.push(msg);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let name = match path.strip_prefix(root) {
                Ok(rel) => format!("{}/{}", base, rel.display()),
                Err(_) => continue,
            };
            match add_file(&mut zip, path, name) {
                Ok(()) => *files_processed += 1,
                Err(e) => {
                    let msg = format!("Error adding file {} to zip: {e}", path.display());
                    tracing::warn!("{msg}");
                    warnings.push(msg);
                }
            }
        }
    }

    for entry in &config.files {
        let path = &entry.path;
        if !path.exists() {
            let msg = format!("Missing file: {}", path.display());
            tracing::warn!("{msg}");
            warnings.push(msg);
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match add_file(&mut zip, path, name) {
            Ok(()) => *files_processed += 1,
            Err(e) => {
                let msg = format!("Error adding file {} to zip: {e}", path.display());
                tracing::warn!("{msg}");
                warnings.push(msg);
            }
        }
    }

    zip.finish()?;
    Ok(())
}

fn add_file(zip: &mut ZipWriter<File>, src: &Path, name: String) -> anyhow::Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, options)?;
    let mut f = File::open(src)?;
    io::copy(&mut f, zip)?;
    Ok(())
}
