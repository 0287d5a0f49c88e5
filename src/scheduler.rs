//! Periodic scheduling of backup runs.
//!
//! One background thread ticks once a second, re-arms itself when the
//! schedule settings change, and invokes a run through the engine when the
//! interval has elapsed. Disabling the scheduler suspends triggering but
//! keeps the configured frequency for when it is re-enabled; a run that
//! has started always completes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::BackupEngine;

/// Global shutdown flag. Set to `true` on first SIGINT/SIGTERM.
pub static SHUTDOWN: AtomicBool = AtomicBool::new(false);

const TICK: Duration = Duration::from_secs(1);

/// Install signal handlers for cooperative shutdown.
///
/// First signal sets [`SHUTDOWN`] and restores the default handler so a
/// second signal terminates immediately.
pub fn install_signal_handlers() {
    #[cfg(unix)]
    {
        // Safety: the handler only sets an atomic bool and restores the
        // default handler.
        unsafe {
            libc::signal(
                libc::SIGTERM,
                unix_signal_handler as *const () as libc::sighandler_t,
            );
            libc::signal(
                libc::SIGINT,
                unix_signal_handler as *const () as libc::sighandler_t,
            );
        }
    }
}

#[cfg(unix)]
extern "C" fn unix_signal_handler(sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
    unsafe {
        libc::signal(sig, libc::SIG_DFL);
    }
}

fn interval(frequency_minutes: u64) -> Duration {
    Duration::from_secs(frequency_minutes * 60)
}

/// Drives periodic runs until `shutdown` is set.
///
/// The loop re-arms its next-run deadline whenever the frequency changes
/// or the scheduler transitions from disabled to enabled, so a stale
/// deadline never fires immediately after a reconfiguration.
pub fn run_loop(engine: &BackupEngine, shutdown: &AtomicBool) {
    let (mut enabled, mut frequency) = engine.schedule_state();
    tracing::info!(
        enabled,
        frequency_minutes = frequency,
        "scheduler starting"
    );
    let mut next_run = Instant::now() + interval(frequency);
    if enabled {
        log_next_run(interval(frequency));
    }

    loop {
        if shutdown.load(Ordering::SeqCst) {
            tracing::info!("shutdown signal received, exiting");
            return;
        }

        let (now_enabled, now_frequency) = engine.schedule_state();
        if now_frequency != frequency || (now_enabled && !enabled) {
            frequency = now_frequency;
            next_run = Instant::now() + interval(frequency);
            if now_enabled {
                log_next_run(interval(frequency));
            }
        }
        enabled = now_enabled;

        if enabled && Instant::now() >= next_run {
            match engine.run_now() {
                Ok(report) if report.success => {
                    tracing::info!("scheduled run completed: {}", report.history_line());
                }
                Ok(report) => {
                    tracing::warn!("scheduled run failed: {}", report.zip_filename);
                }
                Err(e) => {
                    tracing::warn!("scheduled run skipped: {e}");
                }
            }
            next_run = Instant::now() + interval(frequency);
            log_next_run(interval(frequency));
        }

        thread::sleep(TICK);
    }
}

/// Runs the scheduler loop on a dedicated thread.
pub fn spawn(engine: Arc<BackupEngine>, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
    thread::spawn(move || run_loop(&engine, &shutdown))
}

fn log_next_run(delay: Duration) {
    let next_wall = chrono::Local::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    tracing::info!(
        next_run = %next_wall.format("%Y-%m-%d %H:%M:%S"),
        delay = ?delay,
        "next backup scheduled"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackupConfig;
    use tempfile::TempDir;

    #[test]
    fn interval_is_in_minutes() {
        assert_eq!(interval(1).as_secs(), 60);
        assert_eq!(interval(90).as_secs(), 90 * 60);
    }

    #[test]
    fn loop_exits_promptly_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let config = BackupConfig {
            destination: dir.path().join("backups"),
            ..BackupConfig::default()
        };
        let engine = Arc::new(BackupEngine::new(
            config,
            dir.path().join("config.toml"),
        ));
        let shutdown = Arc::new(AtomicBool::new(true));

        let handle = spawn(engine, shutdown);
        handle.join().unwrap();
    }
}
