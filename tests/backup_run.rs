use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use zipkeeper::config::{BackupConfig, HISTORY_LIMIT, SourceEntry};
use zipkeeper::engine::BackupEngine;

fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    file.write_all(content).unwrap();
    path
}

fn engine_with(config: BackupConfig, dir: &TempDir) -> BackupEngine {
    BackupEngine::new(config, dir.path().join("config.toml"))
}

fn archive_names(zip_path: &Path) -> Vec<String> {
    let file = File::open(zip_path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

#[test]
fn single_file_run_end_to_end() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("backups");
    fs::create_dir(&dest).unwrap();
    let report_csv = write_file(dir.path(), "report.csv", b"a,b,c\n1,2,3\n");

    let engine = engine_with(
        BackupConfig {
            zip_name: "daily".to_string(),
            destination: dest.clone(),
            files: vec![SourceEntry::new(&report_csv, "report")],
            ..BackupConfig::default()
        },
        &dir,
    );

    let report = engine.run_now().unwrap();
    assert!(report.success);
    assert!(report.warnings.is_empty());
    assert_eq!(report.files_processed, 1);
    assert!(report.zip_filename.starts_with("daily_"));

    let zip_path = dest.join(&report.zip_filename);
    assert!(zip_path.is_file());
    assert_eq!(archive_names(&zip_path), vec!["report.csv".to_string()]);

    let cfg = engine.get_config();
    assert_eq!(cfg.history[0], report.history_line());
    assert_eq!(cfg.stats.run_count, 1);
    assert_eq!(cfg.stats.last_backup, report.timestamp);
    assert!(cfg.last_warnings.is_empty());
}

#[test]
fn missing_folder_does_not_fail_the_run() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("backups");
    fs::create_dir(&dest).unwrap();

    let docs = dir.path().join("docs");
    fs::create_dir(&docs).unwrap();
    write_file(&docs, "readme.md", b"docs");
    let media = dir.path().join("media");
    fs::create_dir(&media).unwrap();
    write_file(&media, "clip.mp4", b"video");
    let gone = dir.path().join("gone");

    let engine = engine_with(
        BackupConfig {
            destination: dest.clone(),
            folders: vec![
                SourceEntry::new(&docs, "docs"),
                SourceEntry::new(&gone, "gone"),
                SourceEntry::new(&media, "media"),
            ],
            ..BackupConfig::default()
        },
        &dir,
    );

    let report = engine.run_now().unwrap();
    assert!(report.success);
    assert_eq!(report.files_processed, 2);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Missing folder"));

    let names = archive_names(&dest.join(&report.zip_filename));
    assert!(names.contains(&"docs/readme.md".to_string()));
    assert!(names.contains(&"media/clip.mp4".to_string()));

    // success with warnings is distinguished by the flag, not by the
    // warning list
    let cfg = engine.get_config();
    assert_eq!(cfg.last_warnings, report.warnings);
}

#[test]
fn uncreatable_destination_fails_and_skips_retention() {
    let dir = TempDir::new().unwrap();
    // the destination's parent is a regular file, so it can never be created
    let blocker = write_file(dir.path(), "blocker", b"");
    let dest = blocker.join("backups");

    let engine = engine_with(
        BackupConfig {
            destination: dest.clone(),
            retention_count: 1,
            ..BackupConfig::default()
        },
        &dir,
    );

    let report = engine.run_now().unwrap();
    assert!(!report.success);
    assert!(!dest.exists());

    let cfg = engine.get_config();
    assert!(cfg.history[0].ends_with("- FAILED"));
    assert!(
        !cfg.history.iter().any(|l| l.starts_with("Retention policy:")),
        "retention must not run after a failed archive"
    );
}

#[test]
fn history_stays_bounded_and_newest_first() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("backups");
    let engine = engine_with(
        BackupConfig {
            destination: dest,
            ..BackupConfig::default()
        },
        &dir,
    );

    let mut last_line = String::new();
    for _ in 0..(HISTORY_LIMIT + 5) {
        let report = engine.run_now().unwrap();
        assert!(report.success);
        last_line = report.history_line();
    }

    let cfg = engine.get_config();
    assert_eq!(cfg.history.len(), HISTORY_LIMIT);
    assert_eq!(cfg.history[0], last_line);
    assert_eq!(cfg.stats.run_count, (HISTORY_LIMIT + 5) as u64);
}

#[test]
fn unreachable_webhook_does_not_change_the_outcome() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("backups");
    let file = write_file(dir.path(), "data.txt", b"data");

    let engine = engine_with(
        BackupConfig {
            destination: dest,
            webhook_url: "http://127.0.0.1:9/hook".to_string(),
            files: vec![SourceEntry::new(&file, "data")],
            ..BackupConfig::default()
        },
        &dir,
    );

    let report = engine.run_now().unwrap();
    assert!(report.success);
    assert!(report.warnings.is_empty());
}

#[test]
fn vanished_source_after_validation_is_a_warning() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("backups");
    let file = write_file(dir.path(), "fleeting.txt", b"soon gone");

    let engine = engine_with(
        BackupConfig {
            destination: dest,
            files: vec![SourceEntry::new(&file, "fleeting")],
            ..BackupConfig::default()
        },
        &dir,
    );

    fs::remove_file(&file).unwrap();

    let report = engine.run_now().unwrap();
    assert!(report.success);
    assert_eq!(report.files_processed, 0);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("Missing file"));
}
