// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux multiplexer adapter

use super::{MuxAdapter, MuxError};
use async_trait::async_trait;
use corral_core::shell_single_quote;
use std::path::Path;
use tokio::process::Command;

/// Tmux-based multiplexer adapter.
///
/// Targets are always prefixed with `=` so tmux matches session names
/// exactly instead of by prefix.
#[derive(Clone, Default)]
pub struct TmuxMux;

impl TmuxMux {
    pub fn new() -> Self {
        Self
    }

    fn target(name: &str) -> String {
        format!("={}", name)
    }
}

async fn run_tmux(args: &[&str]) -> Result<std::process::Output, MuxError> {
    Command::new("tmux")
        .args(args)
        .output()
        .await
        .map_err(|e| MuxError::CommandFailed(e.to_string()))
}

#[async_trait]
impl MuxAdapter for TmuxMux {
    async fn create_session(&self, name: &str, cwd: &Path, command: &str) -> Result<(), MuxError> {
        // Precondition: cwd must exist, or tmux reports a confusing error
        if !cwd.exists() {
            return Err(MuxError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let cwd_str = cwd.display().to_string();
        let output = run_tmux(&[
            "new-session", "-d", "-s", name, "-c", &cwd_str, command,
        ])
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("duplicate session") {
                return Err(MuxError::NameInUse(name.to_string()));
            }
            tracing::error!(session = name, stderr = %stderr, "tmux new-session failed");
            return Err(MuxError::SpawnFailed(stderr.trim().to_string()));
        }

        // Log stderr even on success - may contain useful warnings
        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(session = name, stderr = %stderr, "tmux new-session stderr (non-fatal)");
        }

        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        let target = Self::target(name);
        let output = run_tmux(&["kill-session", "-t", &target]).await?;
        if !output.status.success() {
            // Session might already be dead, which is fine
        }
        Ok(())
    }

    async fn rename_session(&self, old: &str, new: &str) -> Result<(), MuxError> {
        // tmux happily renames onto an existing name, so collide-check first
        if self.session_exists(new).await? {
            return Err(MuxError::NameInUse(new.to_string()));
        }

        let target = Self::target(old);
        let output = run_tmux(&["rename-session", "-t", &target, new]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("duplicate session") {
                return Err(MuxError::NameInUse(new.to_string()));
            }
            return Err(MuxError::NotFound(old.to_string()));
        }
        Ok(())
    }

    async fn session_exists(&self, name: &str) -> Result<bool, MuxError> {
        let target = Self::target(name);
        let output = run_tmux(&["has-session", "-t", &target]).await?;
        Ok(output.status.success())
    }

    async fn pane_pid(&self, name: &str) -> Result<u32, MuxError> {
        let target = Self::target(name);
        let output = run_tmux(&["list-panes", "-t", &target, "-F", "#{pane_pid}"]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }

        let pid = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .parse::<u32>()
            .unwrap_or(0);
        Ok(pid)
    }

    async fn capture_last_lines(&self, name: &str, n: u32) -> Result<String, MuxError> {
        let target = Self::target(name);
        let start = format!("-{}", n);
        let output = run_tmux(&["capture-pane", "-t", &target, "-p", "-e", "-S", &start]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn set_window_size_manual(&self, name: &str) -> Result<(), MuxError> {
        let target = Self::target(name);
        let output = run_tmux(&["set-option", "-t", &target, "window-size", "manual"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(session = name, stderr = %stderr, "tmux set-option window-size failed");
            // Non-fatal: the session works even with client-driven sizing
        }
        Ok(())
    }

    async fn resize_window(&self, name: &str, cols: u16, rows: u16) -> Result<(), MuxError> {
        let target = Self::target(name);
        let x = cols.to_string();
        let y = rows.to_string();
        let output = run_tmux(&["resize-window", "-t", &target, "-x", &x, "-y", &y]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn start_pipe_pane(&self, name: &str, log_path: &Path) -> Result<(), MuxError> {
        let target = Self::target(name);
        // -o opens a pipe only when none exists, which makes this idempotent
        let sink = format!("cat >> {}", shell_single_quote(&log_path.display().to_string()));
        let output = run_tmux(&["pipe-pane", "-t", &target, "-o", &sink]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn stop_pipe_pane(&self, name: &str) -> Result<(), MuxError> {
        let target = Self::target(name);
        // pipe-pane with no command closes any open pipe
        let output = run_tmux(&["pipe-pane", "-t", &target]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn is_pipe_pane_active(&self, name: &str) -> Result<bool, MuxError> {
        let target = Self::target(name);
        let output = run_tmux(&["display-message", "-t", &target, "-p", "#{pane_pipe}"]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "1")
    }

    fn attach_command(&self, name: &str) -> Vec<String> {
        vec![
            "tmux".to_string(),
            "attach-session".to_string(),
            "-t".to_string(),
            Self::target(name),
        ]
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
