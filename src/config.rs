//! Persistent configuration for the backup engine.
//!
//! This module defines the configuration record the engine owns — sources,
//! destination, schedule, retention, run history and statistics — along with
//! serialization to TOML and utilities for reading and writing the
//! configuration file. Every field defaults, so configuration files written
//! by older versions load cleanly.

use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Default configuration file name.
pub(crate) const CONFIG_NAME: &str = "config.toml";

/// Maximum number of retained history lines.
pub const HISTORY_LIMIT: usize = 20;

/// One file or folder to archive.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Absolute path of the source. Must have passed path validation
    /// before entering the configuration.
    pub path: PathBuf,
    /// Display label for the entry.
    pub label: String,
}

impl SourceEntry {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }
}

/// Run bookkeeping shown alongside the configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunStats {
    #[serde(default)]
    pub run_count: u64,
    #[serde(default = "default_last_backup")]
    pub last_backup: String,
    #[serde(default = "default_next_backup")]
    pub next_backup: String,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            run_count: 0,
            last_backup: default_last_backup(),
            next_backup: default_next_backup(),
        }
    }
}

/// The engine's configuration. Mutated only through explicit engine
/// operations; the history is bounded to [`HISTORY_LIMIT`] lines.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackupConfig {
    /// Base name for produced bundles; archives are named
    /// `{zip_name}_{YYYY-MM-DD_HH-MM-SS}.zip`.
    #[serde(default = "default_zip_name")]
    pub zip_name: String,
    /// Minutes between scheduled runs. Always at least 1.
    #[serde(default = "default_frequency_minutes")]
    pub frequency_minutes: u64,
    /// Directory bundles are written into.
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
    /// Outcome webhook; empty disables notification.
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_true")]
    pub scheduler_enabled: bool,
    /// Number of bundles to keep; 0 keeps all.
    #[serde(default)]
    pub retention_count: usize,
    #[serde(default)]
    pub files: Vec<SourceEntry>,
    #[serde(default)]
    pub folders: Vec<SourceEntry>,
    /// Run and retention log lines, most recent first.
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub stats: RunStats,
    /// Warnings from the most recent run.
    #[serde(default)]
    pub last_warnings: Vec<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            zip_name: default_zip_name(),
            frequency_minutes: default_frequency_minutes(),
            destination: default_destination(),
            webhook_url: String::new(),
            scheduler_enabled: true,
            retention_count: 0,
            files: vec![],
            folders: vec![],
            history: vec![],
            stats: RunStats::default(),
            last_warnings: vec![],
        }
    }
}

impl BackupConfig {
    /// Prepends a history line, evicting the oldest lines past the bound.
    pub fn push_history(&mut self, line: String) {
        self.history.insert(0, line);
        self.history.truncate(HISTORY_LIMIT);
    }
}

/// Partial settings update applied through
/// [`BackupEngine::update_config`](crate::engine::BackupEngine::update_config).
/// `None` fields are left untouched; source lists are replaced wholesale.
#[derive(Debug, Default, Clone)]
pub struct ConfigUpdate {
    pub zip_name: Option<String>,
    pub frequency_minutes: Option<u64>,
    pub destination: Option<PathBuf>,
    pub webhook_url: Option<String>,
    pub retention_count: Option<usize>,
    pub files: Option<Vec<SourceEntry>>,
    pub folders: Option<Vec<SourceEntry>>,
}

fn default_zip_name() -> String {
    "backup".to_string()
}

fn default_frequency_minutes() -> u64 {
    60
}

fn default_destination() -> PathBuf {
    env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn default_true() -> bool {
    true
}

fn default_last_backup() -> String {
    "Never".to_string()
}

fn default_next_backup() -> String {
    "Not scheduled".to_string()
}

/// Returns the absolute path to the configuration file.
pub fn config_file() -> PathBuf {
    let mut path = config_dir();
    path.push(CONFIG_NAME);
    path
}

/// Returns the configuration directory for the application, platform-specific.
fn config_dir() -> PathBuf {
    let mut dir = if cfg!(target_os = "macos") {
        let mut home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.push(".config");
        home
    } else {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    };
    const PKG_NAME: &str = env!("CARGO_PKG_NAME");
    dir.push(PKG_NAME);
    dir
}

/// Loads the configuration from `path`, or returns the defaults if the
/// file does not exist yet.
pub fn load(path: &Path) -> Result<BackupConfig> {
    if !path.exists() {
        return Ok(BackupConfig::default());
    }
    let toml_str = fs::read_to_string(path)?;
    Ok(toml::from_str(&toml_str)?)
}

/// Writes the configuration to `path` in TOML format.
///
/// Creates the parent directory if it does not exist.
pub fn store(path: &Path, config: &BackupConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let mut writer = io::BufWriter::new(file);
    let toml_str = toml::to_string_pretty(config)?;
    writer.write_all(toml_str.as_bytes())?;
    writer.flush()?;
    Ok(())
}
