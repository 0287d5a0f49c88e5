//! Run orchestration and shared configuration state.
//!
//! The engine owns the configuration behind a single mutex and exposes the
//! operations the outer surfaces call: snapshot reads, validated updates,
//! manual runs, scheduler toggling. A second mutex guarantees at most one
//! backup run at a time; runs operate on a configuration snapshot so
//! neither lock is ever held across archive or network work.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use chrono::Local;

use crate::archive::{self, RunReport};
use crate::config::{self, BackupConfig, ConfigUpdate};
use crate::error::{Error, Result};
use crate::preflight::{self, IssueKind};
use crate::stats::{self, SourceTotals};
use crate::{notify, path_util, retention};

pub struct BackupEngine {
    state: Mutex<BackupConfig>,
    run_lock: Mutex<()>,
    config_path: PathBuf,
}

impl BackupEngine {
    /// Creates an engine over an already-loaded configuration, persisting
    /// changes to `config_path`.
    pub fn new(config: BackupConfig, config_path: PathBuf) -> Self {
        Self {
            state: Mutex::new(config),
            run_lock: Mutex::new(()),
            config_path,
        }
    }

    /// Loads the configuration from the default platform location.
    pub fn load_default() -> Result<Self> {
        let path = config::config_file();
        let config = config::load(&path)?;
        Ok(Self::new(config, path))
    }

    /// Returns a snapshot of the current configuration.
    pub fn get_config(&self) -> BackupConfig {
        self.state().clone()
    }

    /// Computes source totals over the current configuration.
    pub fn get_stats(&self) -> SourceTotals {
        let snapshot = self.get_config();
        stats::compute(&snapshot)
    }

    /// Applies a partial settings update.
    ///
    /// Every incoming path is validated first; the whole update is
    /// rejected on the first invalid path and nothing is changed. Source
    /// lists are replaced wholesale.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<()> {
        if let Some(destination) = &update.destination {
            validated(destination)?;
        }
        for entry in update.files.iter().flatten() {
            validated(&entry.path)?;
        }
        for entry in update.folders.iter().flatten() {
            validated(&entry.path)?;
        }
        if update.frequency_minutes == Some(0) {
            return Err(Error::ZeroFrequency);
        }

        let mut cfg = self.state();
        if let Some(zip_name) = update.zip_name {
            cfg.zip_name = zip_name;
        }
        if let Some(frequency_minutes) = update.frequency_minutes {
            cfg.frequency_minutes = frequency_minutes;
        }
        if let Some(destination) = update.destination {
            cfg.destination = destination;
        }
        if let Some(webhook_url) = update.webhook_url {
            cfg.webhook_url = webhook_url.trim().to_string();
        }
        if let Some(retention_count) = update.retention_count {
            cfg.retention_count = retention_count;
        }
        if let Some(files) = update.files {
            cfg.files = files;
        }
        if let Some(folders) = update.folders {
            cfg.folders = folders;
        }
        update_next_backup_time(&mut cfg);
        self.persist(&cfg)
    }

    /// Flips the scheduler flag and returns the new state.
    pub fn toggle_scheduler(&self) -> Result<bool> {
        let mut cfg = self.state();
        cfg.scheduler_enabled = !cfg.scheduler_enabled;
        update_next_backup_time(&mut cfg);
        self.persist(&cfg)?;
        Ok(cfg.scheduler_enabled)
    }

    /// Clears the run history.
    pub fn clear_history(&self) -> Result<()> {
        let mut cfg = self.state();
        cfg.history.clear();
        self.persist(&cfg)
    }

    /// Recomputes the displayed next-backup time. Called once at daemon
    /// startup so a stale persisted value is refreshed.
    pub fn refresh_next_backup(&self) -> Result<()> {
        let mut cfg = self.state();
        update_next_backup_time(&mut cfg);
        self.persist(&cfg)
    }

    /// Executes one backup run: preflight, archive, retention, webhook
    /// notification, then the history/stats update.
    ///
    /// Rejects with [`Error::RunInProgress`] when another run holds the
    /// run lock; concurrent runs against the same destination are never
    /// executed.
    pub fn run_now(&self) -> Result<RunReport> {
        let _guard = match self.run_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return Err(Error::RunInProgress),
        };

        // Runs work on a snapshot; the state lock is only taken again for
        // the final bookkeeping.
        let snapshot = self.get_config();

        let issues = preflight::check(&snapshot.destination, &snapshot.files, &snapshot.folders);
        let preflight_warnings: Vec<String> = issues.iter().map(|i| i.to_string()).collect();
        for warning in &preflight_warnings {
            tracing::warn!("{warning}");
        }
        if !issues.is_empty() {
            let fatal = issues
                .iter()
                .any(|i| i.kind == IssueKind::NoWrite && i.path == snapshot.destination);
            {
                let mut cfg = self.state();
                cfg.last_warnings = preflight_warnings.clone();
                self.persist(&cfg)?;
            }
            if fatal {
                let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
                return Ok(RunReport::failed(
                    String::new(),
                    preflight_warnings,
                    timestamp,
                ));
            }
        }

        let mut report = archive::build(&snapshot);
        if !preflight_warnings.is_empty() {
            let mut warnings = preflight_warnings;
            warnings.append(&mut report.warnings);
            report.warnings = warnings;
        }

        let retention_lines = if report.success {
            retention::apply(&snapshot)
        } else {
            Vec::new()
        };

        notify::notify(&snapshot.webhook_url, &report);

        let mut cfg = self.state();
        cfg.push_history(report.history_line());
        for line in &retention_lines {
            cfg.push_history(line.clone());
        }
        cfg.stats.run_count += 1;
        cfg.stats.last_backup = report.timestamp.clone();
        update_next_backup_time(&mut cfg);
        cfg.last_warnings = report.warnings.clone();
        self.persist(&cfg)?;

        Ok(report)
    }

    /// Scheduler view of the shared state: (enabled, frequency_minutes).
    pub(crate) fn schedule_state(&self) -> (bool, u64) {
        let cfg = self.state();
        (cfg.scheduler_enabled, cfg.frequency_minutes)
    }

    fn state(&self) -> MutexGuard<'_, BackupConfig> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, cfg: &BackupConfig) -> Result<()> {
        config::store(&self.config_path, cfg)
    }
}

fn validated(path: &Path) -> Result<()> {
    let raw = path.to_string_lossy();
    path_util::validate(&raw).map_err(|reason| Error::PathRejected {
        path: raw.into_owned(),
        reason,
    })
}

fn update_next_backup_time(cfg: &mut BackupConfig) {
    cfg.stats.next_backup = if cfg.scheduler_enabled {
        let next = Local::now() + chrono::Duration::minutes(cfg.frequency_minutes as i64);
        next.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        "Scheduler disabled".to_string()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceEntry;
    use tempfile::TempDir;

    fn engine_in(dir: &TempDir) -> BackupEngine {
        let config = BackupConfig {
            destination: dir.path().join("backups"),
            ..BackupConfig::default()
        };
        BackupEngine::new(config, dir.path().join("config.toml"))
    }

    #[test]
    fn update_rejects_invalid_path_and_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        let update = ConfigUpdate {
            zip_name: Some("daily".to_string()),
            files: Some(vec![SourceEntry::new("/data/../etc/shadow", "bad")]),
            ..ConfigUpdate::default()
        };
        let err = engine.update_config(update).unwrap_err();
        assert!(matches!(err, Error::PathRejected { .. }));
        assert!(err.to_string().contains("traversal"));

        let cfg = engine.get_config();
        assert_eq!(cfg.zip_name, "backup");
        assert!(cfg.files.is_empty());
    }

    #[test]
    fn update_rejects_zero_frequency() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        let err = engine
            .update_config(ConfigUpdate {
                frequency_minutes: Some(0),
                ..ConfigUpdate::default()
            })
            .unwrap_err();
        assert!(matches!(err, Error::ZeroFrequency));
        assert_eq!(engine.get_config().frequency_minutes, 60);
    }

    #[test]
    fn update_applies_and_persists() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        engine
            .update_config(ConfigUpdate {
                zip_name: Some("daily".to_string()),
                frequency_minutes: Some(15),
                retention_count: Some(4),
                webhook_url: Some("  https://example.com/hook  ".to_string()),
                files: Some(vec![SourceEntry::new("/data/report.csv", "report")]),
                ..ConfigUpdate::default()
            })
            .unwrap();

        let cfg = engine.get_config();
        assert_eq!(cfg.zip_name, "daily");
        assert_eq!(cfg.frequency_minutes, 15);
        assert_eq!(cfg.retention_count, 4);
        assert_eq!(cfg.webhook_url, "https://example.com/hook");
        assert_eq!(cfg.files.len(), 1);

        let reloaded = config::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(reloaded.zip_name, "daily");
        assert_eq!(reloaded.files.len(), 1);
    }

    #[test]
    fn toggle_flips_flag_and_rewrites_next_backup() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);

        assert!(engine.get_config().scheduler_enabled);
        let enabled = engine.toggle_scheduler().unwrap();
        assert!(!enabled);
        assert_eq!(engine.get_config().stats.next_backup, "Scheduler disabled");

        let enabled = engine.toggle_scheduler().unwrap();
        assert!(enabled);
        let next = engine.get_config().stats.next_backup;
        assert_ne!(next, "Scheduler disabled");
        assert!(next.contains('-'), "expected a timestamp, got {next}");
    }

    #[test]
    fn clear_history_empties_the_log() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        engine.run_now().unwrap();
        assert!(!engine.get_config().history.is_empty());
        engine.clear_history().unwrap();
        assert!(engine.get_config().history.is_empty());
    }
}
