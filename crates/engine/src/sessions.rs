// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session lifecycle: spawn, dispose, rename, bootstrap, liveness.
//!
//! A session is one agent process inside one multiplexer window. Spawning
//! is a transaction: if any step after session creation fails, the
//! half-created multiplexer session is killed before the error returns.

use crate::EngineError;
use chrono::{DateTime, Utc};
use corral_adapters::{MuxAdapter, MuxError};
use corral_config::{Config, StatePaths};
use corral_core::{
    resolve_target, sanitize_mux_name, shell_single_quote, Session, SessionId, Workspace,
};
use corral_storage::StateStore;
use std::sync::Arc;

/// Attempts at disambiguating a colliding multiplexer name.
const NAME_RETRIES: u32 = 3;

/// Manages agent sessions and their multiplexer windows.
#[derive(Clone)]
pub struct SessionManager<M: MuxAdapter> {
    mux: M,
    store: StateStore,
    config: Arc<Config>,
    paths: StatePaths,
}

impl<M: MuxAdapter> SessionManager<M> {
    pub fn new(mux: M, store: StateStore, config: Arc<Config>, paths: StatePaths) -> Self {
        Self {
            mux,
            store,
            config,
            paths,
        }
    }

    pub fn mux(&self) -> &M {
        &self.mux
    }

    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.store.get_session(id)
    }

    pub fn list(&self) -> Vec<Session> {
        self.store.list_sessions()
    }

    /// Spawn an agent session inside `workspace`.
    pub async fn spawn(
        &self,
        workspace: &Workspace,
        target_name: &str,
        prompt: &str,
        nickname: Option<&str>,
    ) -> Result<Session, EngineError> {
        let target = resolve_target(&self.config.targets, target_name)
            .ok_or_else(|| EngineError::NotFound(format!("target: {target_name}")))?;
        if !target.promptable && !prompt.is_empty() {
            return Err(EngineError::SpawnFailed(format!(
                "target {target_name} does not accept a prompt"
            )));
        }

        let session_id = Session::derive_id(&workspace.id);
        let command = build_agent_command(&target.command, &target.env, prompt);

        let nickname = nickname.unwrap_or("").to_string();
        let base_name = if nickname.is_empty() {
            session_id.to_string()
        } else {
            sanitize_mux_name(&nickname)
        };

        // Create, disambiguating on collision with the externally shared mux
        let mux_name = self.create_with_retries(&base_name, workspace, &command).await?;

        // Everything past this point must kill the session on failure
        match self.finish_spawn(&session_id, &mux_name).await {
            Ok(pid) => {
                let now = Utc::now();
                let session = Session {
                    id: session_id.clone(),
                    workspace_id: workspace.id.clone(),
                    target: target_name.to_string(),
                    prompt: prompt.to_string(),
                    nickname,
                    multiplex_name: mux_name.clone(),
                    pid,
                    created_at: now,
                    last_output_at: now,
                    classification: String::new(),
                };
                self.store.add_session(session.clone());
                tracing::info!(
                    session = %session_id,
                    workspace = %workspace.id,
                    target = target_name,
                    mux_name,
                    "session spawned"
                );
                Ok(session)
            }
            Err(e) => {
                let _ = self.mux.kill_session(&mux_name).await;
                let _ = std::fs::remove_file(self.paths.session_log(session_id.as_str()));
                Err(e)
            }
        }
    }

    async fn create_with_retries(
        &self,
        base_name: &str,
        workspace: &Workspace,
        command: &str,
    ) -> Result<String, EngineError> {
        let mut name = base_name.to_string();
        for attempt in 0..=NAME_RETRIES {
            match self
                .mux
                .create_session(&name, &workspace.path, command)
                .await
            {
                Ok(()) => return Ok(name),
                Err(MuxError::NameInUse(_)) if attempt < NAME_RETRIES => {
                    name = format!("{}-{}", base_name, attempt + 2);
                }
                Err(MuxError::NameInUse(n)) => return Err(EngineError::NameConflict(n)),
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::NameConflict(base_name.to_string()))
    }

    /// Post-create steps: geometry, log pipe, pid. Caller kills the session
    /// if any of these fail.
    async fn finish_spawn(&self, session_id: &SessionId, mux_name: &str) -> Result<u32, EngineError> {
        self.mux.set_window_size_manual(mux_name).await?;
        self.mux
            .resize_window(
                mux_name,
                self.config.terminal.width,
                self.config.terminal.height,
            )
            .await?;

        let log_path = self.paths.session_log(session_id.as_str());
        self.ensure_log_file(session_id)
            .map_err(|e| EngineError::SpawnFailed(format!("log file: {e}")))?;
        self.mux.start_pipe_pane(mux_name, &log_path).await?;

        let pid = self.mux.pane_pid(mux_name).await.unwrap_or(0);
        Ok(pid)
    }

    /// Create the session log file. Idempotent.
    fn ensure_log_file(&self, session_id: &SessionId) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.paths.logs_dir)?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.paths.session_log(session_id.as_str()))?;
        Ok(())
    }

    /// Dispose a session. Idempotent: a missing session is a success.
    /// Kill and log-delete failures do not prevent removal from state.
    pub async fn dispose(&self, id: &SessionId) -> Result<(), EngineError> {
        let Some(session) = self.store.get_session(id) else {
            return Ok(());
        };

        if let Err(e) = self.mux.kill_session(&session.multiplex_name).await {
            tracing::warn!(session = %id, error = %e, "kill on dispose failed");
        }
        if let Err(e) = std::fs::remove_file(self.paths.session_log(id.as_str())) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(session = %id, error = %e, "log delete on dispose failed");
            }
        }
        self.store.remove_session(id);
        tracing::info!(session = %id, "session disposed");
        Ok(())
    }

    /// Rename a session's nickname and its multiplexer window.
    ///
    /// On a name collision nothing changes; the caller-supplied nickname is
    /// never rewritten.
    pub async fn rename(&self, id: &SessionId, new_nickname: &str) -> Result<(), EngineError> {
        let mut session = self
            .store
            .get_session(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let new_name = if new_nickname.is_empty() {
            id.to_string()
        } else {
            sanitize_mux_name(new_nickname)
        };
        if new_name == session.multiplex_name {
            session.nickname = new_nickname.to_string();
            self.store.update_session(session)?;
            return Ok(());
        }

        match self
            .mux
            .rename_session(&session.multiplex_name, &new_name)
            .await
        {
            Ok(()) => {}
            Err(MuxError::NameInUse(n)) => return Err(EngineError::NameConflict(n)),
            Err(e) => return Err(e.into()),
        }

        session.nickname = new_nickname.to_string();
        session.multiplex_name = new_name;
        self.store.update_session(session)?;
        Ok(())
    }

    /// Liveness probe: signal-0 on the cached pid, falling back to
    /// multiplexer-session-exists when no pid is cached.
    pub async fn is_running(&self, id: &SessionId) -> bool {
        let Some(session) = self.store.get_session(id) else {
            return false;
        };

        if session.pid != 0 {
            return process_alive(session.pid);
        }
        self.mux
            .session_exists(&session.multiplex_name)
            .await
            .unwrap_or(false)
    }

    /// Reattach persisted sessions after a daemon restart.
    ///
    /// Sessions whose multiplexer window is gone are retained with `pid = 0`
    /// so the user can inspect them. Live windows get their log pipe
    /// restored, seeded from the pane's recent scrollback when the log file
    /// or pipe is missing.
    pub async fn bootstrap(&self) {
        for mut session in self.store.list_sessions() {
            let exists = self
                .mux
                .session_exists(&session.multiplex_name)
                .await
                .unwrap_or(false);

            if !exists {
                if session.pid != 0 {
                    session.pid = 0;
                    let _ = self.store.update_session(session);
                }
                continue;
            }

            let log_path = self.paths.session_log(session.id.as_str());
            let pipe_active = self
                .mux
                .is_pipe_pane_active(&session.multiplex_name)
                .await
                .unwrap_or(false);

            if !pipe_active || !log_path.exists() {
                if let Err(e) = self.seed_log(&session).await {
                    tracing::warn!(session = %session.id, error = %e, "log seed failed");
                }
                if let Err(e) = self
                    .mux
                    .start_pipe_pane(&session.multiplex_name, &log_path)
                    .await
                {
                    tracing::warn!(session = %session.id, error = %e, "pipe restore failed");
                }
            }

            // Refresh the cached pid; the pane may have been respawned
            session.pid = self
                .mux
                .pane_pid(&session.multiplex_name)
                .await
                .unwrap_or(0);

            // Low-resolution activity restore from the log mtime
            if let Some(mtime) = log_mtime(&log_path) {
                if mtime > session.last_output_at {
                    session.last_output_at = mtime;
                }
            }

            let _ = self.store.update_session(session);
        }
    }

    /// Seed the log with the pane's last `terminal.seed_lines` lines.
    async fn seed_log(&self, session: &Session) -> Result<(), EngineError> {
        let captured = self
            .mux
            .capture_last_lines(&session.multiplex_name, self.config.terminal.seed_lines)
            .await?;
        self.ensure_log_file(&session.id)
            .map_err(|e| EngineError::SpawnFailed(format!("log file: {e}")))?;

        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(self.paths.session_log(session.id.as_str()))
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;
        file.write_all(captured.as_bytes())
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;
        Ok(())
    }

    /// Delete log files whose basename is not an active session id.
    pub fn prune_logs(&self) {
        let live: std::collections::HashSet<String> = self
            .store
            .list_sessions()
            .into_iter()
            .map(|s| s.id.to_string())
            .collect();

        let Ok(entries) = std::fs::read_dir(&self.paths.logs_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("log") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !live.contains(stem) {
                tracing::debug!(log = %path.display(), "pruning orphaned log");
                let _ = std::fs::remove_file(&path);
            }
        }
    }
}

/// Build the shell command the pane runs.
///
/// Env overrides become leading `K=V` assignments; the prompt is the only
/// caller-controlled token and is always single-quoted.
pub fn build_agent_command(command: &str, env: &[(String, String)], prompt: &str) -> String {
    let mut parts = Vec::with_capacity(env.len() + 2);
    for (key, value) in env {
        parts.push(format!("{}={}", key, shell_single_quote(value)));
    }
    parts.push(command.to_string());
    if !prompt.is_empty() {
        parts.push(shell_single_quote(prompt));
    }
    parts.join(" ")
}

/// Signal-0 probe for a cached pane pid.
pub fn process_alive(pid: u32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
}

fn log_mtime(path: &std::path::Path) -> Option<DateTime<Utc>> {
    let modified = path.metadata().ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
