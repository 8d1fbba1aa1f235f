// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State-directory layout.
//!
//! Everything the daemon owns lives under one per-user state directory
//! (`$CORRAL_STATE_DIR`, `$XDG_STATE_HOME/corral`, or `~/.local/state/corral`).

use crate::ConfigError;
use std::path::{Path, PathBuf};

/// Resolve the corral state directory.
///
/// `CORRAL_STATE_DIR` takes priority (used by tests for isolation), then
/// `XDG_STATE_HOME/corral`, then `~/.local/state/corral`.
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("CORRAL_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }

    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("corral"));
    }

    let home = dirs::home_dir().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local/state/corral"))
}

/// Fixed file layout under the state directory.
#[derive(Debug, Clone)]
pub struct StatePaths {
    pub state_dir: PathBuf,
    /// Current daemon PID, newline-terminated.
    pub pid_path: PathBuf,
    /// RFC3339 timestamp of the last successful boot.
    pub started_path: PathBuf,
    /// Snapshot of all workspaces and sessions.
    pub state_path: PathBuf,
    /// Daemon's own tracing log.
    pub log_path: PathBuf,
    /// Per-session pipe-pane logs: `logs/<session_id>.log`.
    pub logs_dir: PathBuf,
    /// Classifier structured-output schemas: `schemas/<label>.json`.
    pub schemas_dir: PathBuf,
    /// Read-only configuration input.
    pub config_path: PathBuf,
}

impl StatePaths {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            pid_path: state_dir.join("daemon.pid"),
            started_path: state_dir.join("daemon.started"),
            state_path: state_dir.join("state.json"),
            log_path: state_dir.join("daemon.log"),
            logs_dir: state_dir.join("logs"),
            schemas_dir: state_dir.join("schemas"),
            config_path: state_dir.join("config.json"),
            state_dir,
        }
    }

    /// Resolve from the environment.
    pub fn resolve() -> Result<Self, ConfigError> {
        Ok(Self::new(state_dir()?))
    }

    /// Log file path for a session: a pure function of the session id.
    pub fn session_log(&self, session_id: &str) -> PathBuf {
        self.logs_dir.join(format!("{}.log", session_id))
    }

    /// Schema file path for a classifier label.
    pub fn schema_file(&self, label: &str) -> PathBuf {
        self.schemas_dir.join(format!("{}.json", label))
    }
}

impl Default for StatePaths {
    fn default() -> Self {
        Self::new(Path::new("."))
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
