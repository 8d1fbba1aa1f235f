// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake multiplexer adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{MuxAdapter, MuxError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Recorded multiplexer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxCall {
    Create { name: String, cwd: PathBuf, command: String },
    Kill { name: String },
    Rename { old: String, new: String },
    Resize { name: String, cols: u16, rows: u16 },
    StartPipe { name: String, log_path: PathBuf },
    StopPipe { name: String },
}

/// Fake session state
#[derive(Debug, Clone)]
pub struct FakeMuxSession {
    pub cwd: PathBuf,
    pub command: String,
    pub pid: u32,
    pub pipe_to: Option<PathBuf>,
    pub size: Option<(u16, u16)>,
    pub screen: String,
}

#[derive(Default)]
struct FakeMuxState {
    sessions: HashMap<String, FakeMuxSession>,
    calls: Vec<MuxCall>,
    next_pid: u32,
    fail_create: bool,
    /// Override for `attach_command`; `{name}` expands to the session name.
    attach_argv: Option<Vec<String>>,
}

/// Fake multiplexer adapter for testing.
///
/// Sessions live in memory; pipe-pane writes go to the real log path so
/// code that stats or reads logs behaves as in production.
#[derive(Clone)]
pub struct FakeMux {
    inner: Arc<Mutex<FakeMuxState>>,
}

impl Default for FakeMux {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeMuxState {
                next_pid: 1000,
                ..FakeMuxState::default()
            })),
        }
    }
}

impl FakeMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<MuxCall> {
        self.inner.lock().calls.clone()
    }

    /// Get a session by name
    pub fn get_session(&self, name: &str) -> Option<FakeMuxSession> {
        self.inner.lock().sessions.get(name).cloned()
    }

    pub fn session_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().sessions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Add a pre-existing session by name (e.g. surviving a daemon restart)
    pub fn add_session(&self, name: &str) {
        let mut state = self.inner.lock();
        let pid = state.next_pid;
        state.next_pid += 1;
        state.sessions.insert(
            name.to_string(),
            FakeMuxSession {
                cwd: PathBuf::new(),
                command: String::new(),
                pid,
                pipe_to: None,
                size: None,
                screen: String::new(),
            },
        );
    }

    /// Set the rendered screen content returned by capture
    pub fn set_screen(&self, name: &str, screen: &str) {
        if let Some(s) = self.inner.lock().sessions.get_mut(name) {
            s.screen = screen.to_string();
        }
    }

    /// Make the next create fail with a non-name error
    pub fn fail_next_create(&self) {
        self.inner.lock().fail_create = true;
    }

    /// Override the attach command (for driving trackers in tests).
    /// `{name}` in an element expands to the session name.
    pub fn set_attach_argv(&self, argv: &[&str]) {
        self.inner.lock().attach_argv = Some(argv.iter().map(|s| s.to_string()).collect());
    }

    /// Append bytes to the session's pipe log, as a piping pane would
    pub fn emit_output(&self, name: &str, bytes: &[u8]) -> std::io::Result<()> {
        let pipe_to = self
            .inner
            .lock()
            .sessions
            .get(name)
            .and_then(|s| s.pipe_to.clone());
        if let Some(path) = pipe_to {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            f.write_all(bytes)?;
        }
        Ok(())
    }
}

#[async_trait]
impl MuxAdapter for FakeMux {
    async fn create_session(&self, name: &str, cwd: &Path, command: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::Create {
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
            command: command.to_string(),
        });
        if state.fail_create {
            state.fail_create = false;
            return Err(MuxError::SpawnFailed("injected failure".to_string()));
        }
        if state.sessions.contains_key(name) {
            return Err(MuxError::NameInUse(name.to_string()));
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        state.sessions.insert(
            name.to_string(),
            FakeMuxSession {
                cwd: cwd.to_path_buf(),
                command: command.to_string(),
                pid,
                pipe_to: None,
                size: None,
                screen: String::new(),
            },
        );
        Ok(())
    }

    async fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::Kill { name: name.to_string() });
        state.sessions.remove(name);
        Ok(())
    }

    async fn rename_session(&self, old: &str, new: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::Rename {
            old: old.to_string(),
            new: new.to_string(),
        });
        if state.sessions.contains_key(new) {
            return Err(MuxError::NameInUse(new.to_string()));
        }
        match state.sessions.remove(old) {
            Some(session) => {
                state.sessions.insert(new.to_string(), session);
                Ok(())
            }
            None => Err(MuxError::NotFound(old.to_string())),
        }
    }

    async fn session_exists(&self, name: &str) -> Result<bool, MuxError> {
        Ok(self.inner.lock().sessions.contains_key(name))
    }

    async fn pane_pid(&self, name: &str) -> Result<u32, MuxError> {
        self.inner
            .lock()
            .sessions
            .get(name)
            .map(|s| s.pid)
            .ok_or_else(|| MuxError::NotFound(name.to_string()))
    }

    async fn capture_last_lines(&self, name: &str, n: u32) -> Result<String, MuxError> {
        let state = self.inner.lock();
        let session = state
            .sessions
            .get(name)
            .ok_or_else(|| MuxError::NotFound(name.to_string()))?;
        let lines: Vec<&str> = session.screen.lines().collect();
        let start = lines.len().saturating_sub(n as usize);
        let mut tail = lines[start..].join("\n");
        if !tail.is_empty() {
            tail.push('\n');
        }
        Ok(tail)
    }

    async fn set_window_size_manual(&self, _name: &str) -> Result<(), MuxError> {
        Ok(())
    }

    async fn resize_window(&self, name: &str, cols: u16, rows: u16) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::Resize {
            name: name.to_string(),
            cols,
            rows,
        });
        match state.sessions.get_mut(name) {
            Some(s) => {
                s.size = Some((cols, rows));
                Ok(())
            }
            None => Err(MuxError::NotFound(name.to_string())),
        }
    }

    async fn start_pipe_pane(&self, name: &str, log_path: &Path) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::StartPipe {
            name: name.to_string(),
            log_path: log_path.to_path_buf(),
        });
        match state.sessions.get_mut(name) {
            Some(s) => {
                if s.pipe_to.is_none() {
                    s.pipe_to = Some(log_path.to_path_buf());
                }
                Ok(())
            }
            None => Err(MuxError::NotFound(name.to_string())),
        }
    }

    async fn stop_pipe_pane(&self, name: &str) -> Result<(), MuxError> {
        let mut state = self.inner.lock();
        state.calls.push(MuxCall::StopPipe { name: name.to_string() });
        match state.sessions.get_mut(name) {
            Some(s) => {
                s.pipe_to = None;
                Ok(())
            }
            None => Err(MuxError::NotFound(name.to_string())),
        }
    }

    async fn is_pipe_pane_active(&self, name: &str) -> Result<bool, MuxError> {
        self.inner
            .lock()
            .sessions
            .get(name)
            .map(|s| s.pipe_to.is_some())
            .ok_or_else(|| MuxError::NotFound(name.to_string()))
    }

    fn attach_command(&self, name: &str) -> Vec<String> {
        if let Some(argv) = self.inner.lock().attach_argv.clone() {
            return argv
                .into_iter()
                .map(|part| part.replace("{name}", name))
                .collect();
        }
        vec!["fake-attach".to_string(), name.to_string()]
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
