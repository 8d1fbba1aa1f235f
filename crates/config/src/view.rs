// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed configuration view with defaults.

use crate::ConfigError;
use corral_core::TargetDef;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A known repository mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub url: String,
}

/// Fixed pane geometry for spawned sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default = "default_term_width")]
    pub width: u16,
    #[serde(default = "default_term_height")]
    pub height: u16,
    /// Lines captured to seed a log when reattaching a session whose pipe
    /// is missing.
    #[serde(default = "default_seed_lines")]
    pub seed_lines: u32,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            width: default_term_width(),
            height: default_term_height(),
            seed_lines: default_seed_lines(),
        }
    }
}

/// Classifier settings. An empty target disables the classifier loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub target: String,
}

fn default_term_width() -> u16 {
    200
}
fn default_term_height() -> u16 {
    50
}
fn default_seed_lines() -> u32 {
    200
}
fn default_mtime_poll_ms() -> u64 {
    1000
}
fn default_git_status_poll_ms() -> u64 {
    30_000
}
fn default_git_status_timeout_secs() -> u64 {
    20
}
fn default_git_clone_timeout_secs() -> u64 {
    300
}
fn default_inactivity_threshold_secs() -> u64 {
    15
}
fn default_listen_addr() -> String {
    "127.0.0.1:8337".to_string()
}

/// Read-only daemon configuration.
///
/// All fields are optional in the file; accessors hand out typed values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parent directory for all workspace folders. Empty means
    /// `<state_dir>/workspaces` (resolved by the daemon at boot).
    pub workspace_root: PathBuf,
    pub repos: Vec<RepoEntry>,
    pub terminal: TerminalConfig,
    pub mtime_poll_ms: u64,
    pub git_status_poll_ms: u64,
    pub git_status_timeout_secs: u64,
    pub git_clone_timeout_secs: u64,
    pub classifier: ClassifierConfig,
    pub inactivity_threshold_secs: u64,
    /// Consumed by the HTTP layer; echoed by `corral status`.
    pub listen_addr: String,
    /// User-defined promptable targets.
    pub targets: Vec<TargetDef>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::new(),
            repos: Vec::new(),
            terminal: TerminalConfig::default(),
            mtime_poll_ms: default_mtime_poll_ms(),
            git_status_poll_ms: default_git_status_poll_ms(),
            git_status_timeout_secs: default_git_status_timeout_secs(),
            git_clone_timeout_secs: default_git_clone_timeout_secs(),
            classifier: ClassifierConfig::default(),
            inactivity_threshold_secs: default_inactivity_threshold_secs(),
            listen_addr: default_listen_addr(),
            targets: Vec::new(),
        }
    }
}

impl Config {
    /// Load from a config file. A missing file yields all defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Look up a repo URL by its short name. Names that are already URLs or
    /// paths pass through unchanged.
    pub fn repo_url(&self, name_or_url: &str) -> String {
        self.repos
            .iter()
            .find(|r| r.name == name_or_url)
            .map(|r| r.url.clone())
            .unwrap_or_else(|| name_or_url.to_string())
    }

    pub fn mtime_poll(&self) -> Duration {
        Duration::from_millis(self.mtime_poll_ms.max(100))
    }

    pub fn git_status_poll(&self) -> Duration {
        Duration::from_millis(self.git_status_poll_ms.max(1000))
    }

    pub fn git_status_timeout(&self) -> Duration {
        Duration::from_secs(self.git_status_timeout_secs.max(1))
    }

    pub fn git_clone_timeout(&self) -> Duration {
        Duration::from_secs(self.git_clone_timeout_secs.max(1))
    }

    pub fn inactivity_threshold(&self) -> Duration {
        Duration::from_secs(self.inactivity_threshold_secs)
    }

    /// Workspace root, resolved against the state directory when unset.
    pub fn workspace_root_in(&self, state_dir: &Path) -> PathBuf {
        if self.workspace_root.as_os_str().is_empty() {
            state_dir.join("workspaces")
        } else {
            self.workspace_root.clone()
        }
    }

    /// Whether the classifier loop should run at all.
    pub fn classifier_enabled(&self) -> bool {
        !self.classifier.target.is_empty()
    }
}

#[cfg(test)]
#[path = "view_tests.rs"]
mod tests;
