// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process control: start, stop, status, foreground run.

use anyhow::{anyhow, Context, Result};
use corral_config::{Config, StatePaths};
use corral_core::format_elapsed;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How long `start` and `stop` wait for the daemon to come up or go away.
const WAIT_BUDGET: Duration = Duration::from_secs(5);

/// Start the daemon in the background. Idempotent: a running daemon is
/// reported, not replaced.
pub fn start() -> Result<()> {
    let paths = StatePaths::resolve()?;

    if let Some(pid) = running_daemon_pid(&paths) {
        println!("Daemon already running (pid {pid})");
        return Ok(());
    }

    let corrald = find_corrald_binary()?;
    Command::new(&corrald)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawning {}", corrald.display()))?;

    // Wait for the pidfile to appear and the process to answer signal-0
    let deadline = Instant::now() + WAIT_BUDGET;
    while Instant::now() < deadline {
        if let Some(pid) = running_daemon_pid(&paths) {
            println!("Daemon started (pid {pid})");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    Err(anyhow!(
        "daemon did not come up within {}s; check {}",
        WAIT_BUDGET.as_secs(),
        paths.log_path.display()
    ))
}

/// Stop the daemon with SIGTERM, waiting up to 5 s for it to exit.
pub fn stop() -> Result<()> {
    let paths = StatePaths::resolve()?;

    let Some(pid) = running_daemon_pid(&paths) else {
        // Clean up a stale pidfile from a crashed daemon
        if paths.pid_path.exists() {
            let _ = std::fs::remove_file(&paths.pid_path);
        }
        println!("Daemon not running");
        return Ok(());
    };

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).context("sending SIGTERM")?;

    let deadline = Instant::now() + WAIT_BUDGET;
    while Instant::now() < deadline {
        if !process_alive(pid) {
            println!("Daemon stopped");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    Err(anyhow!("daemon (pid {pid}) did not exit within 5s"))
}

/// Print the dashboard URL and start time. Exit 1 when not running.
pub fn status() -> Result<()> {
    let paths = StatePaths::resolve()?;

    let Some(pid) = running_daemon_pid(&paths) else {
        println!("Daemon not running");
        std::process::exit(1);
    };

    let config = Config::load(&paths.config_path).unwrap_or_default();
    println!("Daemon running (pid {pid})");
    println!("  url: http://{}/", config.listen_addr);

    if let Some(started) = read_started_at(&paths) {
        let uptime = (chrono::Utc::now() - started).num_seconds().max(0) as u64;
        println!("  started: {} (up {})", started.to_rfc3339(), format_elapsed(uptime));
    }

    if let Ok(content) = std::fs::read_to_string(&paths.state_path) {
        if let Ok(state) = serde_json::from_str::<serde_json::Value>(&content) {
            let workspaces = state["workspaces"].as_array().map(Vec::len).unwrap_or(0);
            let sessions = state["sessions"].as_array().map(Vec::len).unwrap_or(0);
            println!("  workspaces: {workspaces}, sessions: {sessions}");
        }
    }

    Ok(())
}

/// Run the daemon in the foreground, propagating its exit status.
pub fn daemon_run() -> Result<()> {
    let corrald = find_corrald_binary()?;
    let status = Command::new(&corrald)
        .status()
        .with_context(|| format!("running {}", corrald.display()))?;
    if !status.success() {
        return Err(anyhow!("daemon exited with status: {status}"));
    }
    Ok(())
}

/// PID from the pidfile, if that process is alive.
fn running_daemon_pid(paths: &StatePaths) -> Option<u32> {
    let pid: u32 = std::fs::read_to_string(&paths.pid_path)
        .ok()?
        .trim()
        .parse()
        .ok()?;
    process_alive(pid).then_some(pid)
}

fn process_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

fn read_started_at(paths: &StatePaths) -> Option<chrono::DateTime<chrono::Utc>> {
    let content = std::fs::read_to_string(&paths.started_path).ok()?;
    chrono::DateTime::parse_from_rfc3339(content.trim())
        .ok()
        .map(|t| t.with_timezone(&chrono::Utc))
}

/// Locate the corrald binary: next to the current executable, else on PATH.
fn find_corrald_binary() -> Result<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("corrald");
            if sibling.exists() {
                return Ok(sibling);
            }
        }
    }
    Ok(PathBuf::from("corrald"))
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
