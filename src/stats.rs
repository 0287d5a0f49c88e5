//! Informational totals over the configured sources.
//!
//! Computed on demand for display, independent of any run. Best-effort:
//! entries that are missing or unreadable are skipped, never errors.

use std::fs;

use walkdir::WalkDir;

use crate::config::BackupConfig;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Aggregate size and entry counts of the configured sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceTotals {
    /// Total bytes of all currently existing sources, in MB, rounded to
    /// two decimal places.
    pub total_size_mb: f64,
    /// Number of configured file entries, existing or not.
    pub file_count: usize,
    /// Number of configured folder entries, existing or not.
    pub folder_count: usize,
}

/// Sums the sizes of all currently existing configured files and of every
/// file under the currently existing configured folders.
pub fn compute(config: &BackupConfig) -> SourceTotals {
    let mut total_bytes: u64 = 0;

    for entry in &config.files {
        if let Ok(metadata) = fs::metadata(&entry.path) {
            total_bytes += metadata.len();
        }
    }

    for entry in &config.folders {
        if !entry.path.exists() {
            continue;
        }
        for item in WalkDir::new(&entry.path).into_iter().filter_map(|e| e.ok()) {
            if !item.file_type().is_file() {
                continue;
            }
            if let Ok(metadata) = item.metadata() {
                total_bytes += metadata.len();
            }
        }
    }

    SourceTotals {
        total_size_mb: (total_bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0,
        file_count: config.files.len(),
        folder_count: config.folders.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceEntry;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn sums_files_and_folder_contents() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.bin");
        File::create(&file).unwrap().write_all(&[0u8; 1024]).unwrap();

        let folder = dir.path().join("data");
        std::fs::create_dir_all(folder.join("sub")).unwrap();
        File::create(folder.join("b.bin"))
            .unwrap()
            .write_all(&[0u8; 2048])
            .unwrap();
        File::create(folder.join("sub").join("c.bin"))
            .unwrap()
            .write_all(&[0u8; 4096])
            .unwrap();

        let config = BackupConfig {
            files: vec![SourceEntry::new(&file, "a")],
            folders: vec![SourceEntry::new(&folder, "data")],
            ..BackupConfig::default()
        };
        let totals = compute(&config);
        assert_eq!(totals.file_count, 1);
        assert_eq!(totals.folder_count, 1);
        // 7168 bytes, rounded to two decimals
        assert_eq!(totals.total_size_mb, 0.01);
    }

    #[test]
    fn missing_entries_still_count_but_add_no_size() {
        let dir = TempDir::new().unwrap();
        let config = BackupConfig {
            files: vec![SourceEntry::new(dir.path().join("gone.txt"), "gone")],
            folders: vec![SourceEntry::new(dir.path().join("gone-dir"), "gone")],
            ..BackupConfig::default()
        };
        let totals = compute(&config);
        assert_eq!(totals.file_count, 1);
        assert_eq!(totals.folder_count, 1);
        assert_eq!(totals.total_size_mb, 0.0);
    }

    #[test]
    fn empty_configuration_is_all_zero() {
        let totals = compute(&BackupConfig {
            files: vec![],
            folders: vec![],
            ..BackupConfig::default()
        });
        assert_eq!(
            totals,
            SourceTotals {
                total_size_mb: 0.0,
                file_count: 0,
                folder_count: 0
            }
        );
    }
}
