use std::process;

use clap::Parser;

use zipkeeper::commands::{self, Cli, Commands};

/// Entry point for the zipkeeper CLI.
/// Parses command-line arguments, initializes logging, and dispatches to
/// the appropriate command handler.
fn main() {
    let cli = Cli::parse();

    // Initialize logging — auto-upgrade to info for daemon mode
    let filter = match cli.verbose {
        0 if matches!(&cli.commands, Some(Commands::Daemon)) => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let Some(command) = cli.commands else {
        eprintln!("zkeep requires a command to execute. See 'zkeep --help' for usage.");
        process::exit(2);
    };

    if let Err(e) = commands::dispatch(command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
