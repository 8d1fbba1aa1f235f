// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal multiplexer adapters

mod tmux;

pub use tmux::TmuxMux;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMux, FakeMuxSession, MuxCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from multiplexer operations
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session name already in use: {0}")]
    NameInUse(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Adapter for a terminal multiplexer with durable detached sessions.
///
/// Callers pass already-sanitized session names; sanitization happens in
/// `corral_core::sanitize_mux_name` before names reach this seam. The
/// multiplexer is shared with the user across daemon restarts, so every
/// operation tolerates concurrent external changes: kills are idempotent
/// and creates detect [`MuxError::NameInUse`].
#[async_trait]
pub trait MuxAdapter: Clone + Send + Sync + 'static {
    /// Start a detached session running the given shell command.
    async fn create_session(&self, name: &str, cwd: &Path, command: &str) -> Result<(), MuxError>;

    /// Kill a session. Succeeds even if the session is already gone.
    async fn kill_session(&self, name: &str) -> Result<(), MuxError>;

    /// Rename a session atomically.
    async fn rename_session(&self, old: &str, new: &str) -> Result<(), MuxError>;

    /// Whether a session with this exact name exists.
    async fn session_exists(&self, name: &str) -> Result<bool, MuxError>;

    /// PID of the pane's initial command, or 0 when unavailable.
    async fn pane_pid(&self, name: &str) -> Result<u32, MuxError>;

    /// Last `n` rendered lines, including escape sequences.
    async fn capture_last_lines(&self, name: &str, n: u32) -> Result<String, MuxError>;

    /// Decouple the pane size from attached clients.
    async fn set_window_size_manual(&self, name: &str) -> Result<(), MuxError>;

    /// Force the pane to a fixed geometry.
    async fn resize_window(&self, name: &str, cols: u16, rows: u16) -> Result<(), MuxError>;

    /// Begin appending every byte the pane emits to `log_path`.
    /// No-op when a pipe is already open for the pane.
    async fn start_pipe_pane(&self, name: &str, log_path: &Path) -> Result<(), MuxError>;

    /// Stop piping pane output.
    async fn stop_pipe_pane(&self, name: &str) -> Result<(), MuxError>;

    /// Whether a pipe is currently open for the pane.
    async fn is_pipe_pane_active(&self, name: &str) -> Result<bool, MuxError>;

    /// Shell command a human can run to attach to the session.
    fn attach_command(&self, name: &str) -> Vec<String>;
}
