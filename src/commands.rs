//! Command-line interface definition for zipkeeper.
//!
//! This module defines all CLI commands, their arguments, and the handlers
//! that drive the backup engine: running and scheduling backups, managing
//! sources and settings, and inspecting history and statistics.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::{self, ConfigUpdate, SourceEntry};
use crate::engine::BackupEngine;
use crate::{Result, scheduler};

/// Command-line interface definition for zipkeeper.
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Subcommand to execute.
    #[command(subcommand)]
    pub commands: Option<Commands>,
}

/// Supported zipkeeper commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a backup immediately.
    Run,
    /// Run the backup scheduler in the foreground.
    Daemon,
    /// Add a file or folder source to the configuration.
    Add {
        /// Absolute path of the source.
        path: String,
        /// Display label for the entry. Defaults to the path's base name.
        label: Option<String>,
        /// Treat the path as a folder source.
        #[arg(short = 'd', long)]
        folder: bool,
    },
    /// Remove a source from the configuration by path.
    Remove {
        /// Path of the source to remove.
        path: String,
        /// Remove from the folder sources instead of the file sources.
        #[arg(short = 'd', long)]
        folder: bool,
    },
    /// Update settings. At least one option must be provided.
    Set {
        /// Base name for produced bundles.
        #[arg(short, long, required_unless_present_any = ["frequency_minutes", "destination", "webhook_url", "retention_count"])]
        zip_name: Option<String>,
        /// Minutes between scheduled runs.
        #[arg(short, long, required_unless_present_any = ["zip_name", "destination", "webhook_url", "retention_count"])]
        frequency_minutes: Option<u64>,
        /// Directory bundles are written into.
        #[arg(short, long, required_unless_present_any = ["zip_name", "frequency_minutes", "webhook_url", "retention_count"])]
        destination: Option<String>,
        /// Outcome webhook URL; pass an empty string to disable.
        #[arg(short, long, required_unless_present_any = ["zip_name", "frequency_minutes", "destination", "retention_count"])]
        webhook_url: Option<String>,
        /// Number of bundles to keep; 0 keeps all.
        #[arg(short, long, required_unless_present_any = ["zip_name", "frequency_minutes", "destination", "webhook_url"])]
        retention_count: Option<usize>,
    },
    /// Enable or disable the scheduler.
    Toggle,
    /// Show source totals and run statistics.
    Stats,
    /// Show the run history.
    History {
        /// Clear the history instead of printing it.
        #[arg(long)]
        clear: bool,
    },
    /// Display the absolute path of the configuration file.
    Config,
}

/// Executes a parsed command against the engine.
pub fn dispatch(command: Commands) -> Result<()> {
    // `config` needs no engine or configuration file
    if matches!(command, Commands::Config) {
        config();
        return Ok(());
    }

    let engine = BackupEngine::load_default()?;
    match command {
        Commands::Run => run(&engine),
        Commands::Daemon => daemon(&engine),
        Commands::Add {
            path,
            label,
            folder,
        } => add(&engine, path, label, folder),
        Commands::Remove { path, folder } => remove(&engine, path, folder),
        Commands::Set {
            zip_name,
            frequency_minutes,
            destination,
            webhook_url,
            retention_count,
        } => {
            engine.update_config(ConfigUpdate {
                zip_name,
                frequency_minutes,
                destination: destination.map(PathBuf::from),
                webhook_url,
                retention_count,
                files: None,
                folders: None,
            })?;
            println!("Settings updated.");
            Ok(())
        }
        Commands::Toggle => {
            if engine.toggle_scheduler()? {
                println!("Scheduler enabled.");
            } else {
                println!("Scheduler disabled.");
            }
            Ok(())
        }
        Commands::Stats => {
            stats(&engine);
            Ok(())
        }
        Commands::History { clear } => history(&engine, clear),
        Commands::Config => unreachable!("handled above"),
    }
}

/// Runs one backup immediately and prints the outcome.
fn run(engine: &BackupEngine) -> Result<()> {
    let report = engine.run_now()?;
    if report.success {
        println!("Backup completed: {}", report.history_line());
    } else if report.zip_filename.is_empty() {
        println!("Backup failed.");
    } else {
        println!("Backup failed: {}", report.zip_filename);
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    Ok(())
}

/// Runs the scheduler loop on the current thread until interrupted.
fn daemon(engine: &BackupEngine) -> Result<()> {
    engine.refresh_next_backup()?;
    scheduler::install_signal_handlers();
    scheduler::run_loop(engine, &scheduler::SHUTDOWN);
    Ok(())
}

/// Adds one source entry, validating its path via the engine.
fn add(engine: &BackupEngine, path: String, label: Option<String>, folder: bool) -> Result<()> {
    let label = label.unwrap_or_else(|| {
        Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone())
    });
    let entry = SourceEntry::new(PathBuf::from(&path), label);

    let cfg = engine.get_config();
    let update = if folder {
        let mut folders = cfg.folders;
        folders.push(entry);
        ConfigUpdate {
            folders: Some(folders),
            ..ConfigUpdate::default()
        }
    } else {
        let mut files = cfg.files;
        files.push(entry);
        ConfigUpdate {
            files: Some(files),
            ..ConfigUpdate::default()
        }
    };
    engine.update_config(update)?;
    println!("Added {} source: {path}", kind_name(folder));
    Ok(())
}

/// Removes one source entry by path.
fn remove(engine: &BackupEngine, path: String, folder: bool) -> Result<()> {
    let cfg = engine.get_config();
    let mut entries = if folder { cfg.folders } else { cfg.files };
    let before = entries.len();
    entries.retain(|e| e.path != Path::new(&path));
    if entries.len() == before {
        println!("No {} source with path {path}.", kind_name(folder));
        return Ok(());
    }

    let update = if folder {
        ConfigUpdate {
            folders: Some(entries),
            ..ConfigUpdate::default()
        }
    } else {
        ConfigUpdate {
            files: Some(entries),
            ..ConfigUpdate::default()
        }
    };
    engine.update_config(update)?;
    println!("Removed {} source: {path}", kind_name(folder));
    Ok(())
}

/// Prints source totals and run statistics.
fn stats(engine: &BackupEngine) {
    let totals = engine.get_stats();
    let cfg = engine.get_config();
    println!("Files configured:   {}", totals.file_count);
    println!("Folders configured: {}", totals.folder_count);
    println!("Total source size:  {:.2} MB", totals.total_size_mb);
    println!("Backups run:        {}", cfg.stats.run_count);
    println!("Last backup:        {}", cfg.stats.last_backup);
    println!("Next backup:        {}", cfg.stats.next_backup);
}

/// Prints or clears the run history.
fn history(engine: &BackupEngine, clear: bool) -> Result<()> {
    if clear {
        engine.clear_history()?;
        println!("History cleared.");
        return Ok(());
    }
    let cfg = engine.get_config();
    if cfg.history.is_empty() {
        println!("No backup history.");
    } else {
        for line in &cfg.history {
            println!("{line}");
        }
    }
    if !cfg.last_warnings.is_empty() {
        println!("\nWarnings from the last run:");
        for warning in &cfg.last_warnings {
            println!("  {warning}");
        }
    }
    Ok(())
}

/// Prints the absolute path to the configuration file.
fn config() {
    println!("config file: {}", config::config_file().display());
}

fn kind_name(folder: bool) -> &'static str {
    if folder { "folder" } else { "file" }
}
