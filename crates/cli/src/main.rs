// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `corral` - process control for the corral daemon.
//!
//! Everything beyond daemon process control is a client of the daemon's
//! control API; this binary only starts, stops, and inspects the daemon.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod daemon_process;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "corral", version, about = "Corrals fleets of coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon in the background (idempotent)
    Start,
    /// Stop the daemon (SIGTERM, waits up to 5s)
    Stop,
    /// Show daemon status: URL and start time
    Status,
    /// Run the daemon in the foreground (used by `start`)
    DaemonRun,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Start => daemon_process::start(),
        Command::Stop => daemon_process::stop(),
        Command::Status => daemon_process::status(),
        Command::DaemonRun => daemon_process::daemon_run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
