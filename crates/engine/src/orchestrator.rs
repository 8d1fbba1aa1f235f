// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The synchronous facade external callers drive.
//!
//! HTTP handlers and the CLI only ever talk to this type. Spawn, dispose,
//! and rename persist state before returning; output attachment lazily
//! starts a per-session tracker.

use crate::sessions::SessionManager;
use crate::tracker::Tracker;
use crate::workspaces::WorkspaceManager;
use crate::EngineError;
use corral_adapters::{MuxAdapter, VcsAdapter};
use corral_config::{Config, StatePaths};
use corral_core::{Session, SessionId, WorkspaceId};
use corral_storage::{StateSnapshot, StateStore};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Core orchestrator: workspaces, sessions, trackers, state.
pub struct Orchestrator<M: MuxAdapter, V: VcsAdapter> {
    store: StateStore,
    config: Arc<Config>,
    mux: M,
    workspaces: WorkspaceManager<V>,
    sessions: SessionManager<M>,
    trackers: Mutex<HashMap<SessionId, Tracker>>,
    cancel: CancellationToken,
}

impl<M: MuxAdapter, V: VcsAdapter> Orchestrator<M, V> {
    pub fn new(
        mux: M,
        vcs: V,
        store: StateStore,
        config: Arc<Config>,
        paths: StatePaths,
        cancel: CancellationToken,
    ) -> Self {
        let workspace_root = config.workspace_root_in(&paths.state_dir);
        let workspaces = WorkspaceManager::new(
            vcs,
            store.clone(),
            Arc::clone(&config),
            workspace_root,
            cancel.clone(),
        );
        let sessions = SessionManager::new(mux.clone(), store.clone(), Arc::clone(&config), paths);

        Self {
            store,
            config,
            mux,
            workspaces,
            sessions,
            trackers: Mutex::new(HashMap::new()),
            cancel,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn workspaces(&self) -> &WorkspaceManager<V> {
        &self.workspaces
    }

    pub fn sessions(&self) -> &SessionManager<M> {
        &self.sessions
    }

    /// Snapshot of all workspaces with their sessions.
    pub fn list(&self) -> StateSnapshot {
        self.store.snapshot()
    }

    /// Spawn an agent session.
    ///
    /// `repo` may be a configured repo name or a URL. With `workspace_id`
    /// set, the existing workspace is used as-is and no git operations run.
    pub async fn spawn(
        &self,
        repo: &str,
        branch: &str,
        target: &str,
        prompt: &str,
        nickname: Option<&str>,
        workspace_id: Option<&WorkspaceId>,
    ) -> Result<SessionId, EngineError> {
        let workspace = match workspace_id {
            Some(id) => self
                .store
                .get_workspace(id)
                .ok_or_else(|| EngineError::NotFound(id.to_string()))?,
            None => {
                let repo_url = self.config.repo_url(repo);
                self.workspaces.get_or_create(&repo_url, branch).await?
            }
        };

        let session = self.sessions.spawn(&workspace, target, prompt, nickname).await?;
        self.store.persist_now().await?;
        Ok(session.id)
    }

    /// Dispose a session. Idempotent.
    pub async fn dispose(&self, id: &SessionId) -> Result<(), EngineError> {
        if let Some(tracker) = self.trackers.lock().remove(id) {
            tracker.stop();
        }
        self.sessions.dispose(id).await?;
        self.store.persist_now().await?;
        Ok(())
    }

    /// Rename a session's nickname (and its multiplexer window).
    pub async fn rename(&self, id: &SessionId, nickname: &str) -> Result<(), EngineError> {
        self.sessions.rename(id, nickname).await?;

        // Force the tracker through a reattach cycle against the new name
        if let Some(session) = self.store.get_session(id) {
            if let Some(tracker) = self.trackers.lock().get(id) {
                tracker.notify_renamed(session.multiplex_name.clone());
            }
        }
        self.store.persist_now().await?;
        Ok(())
    }

    /// Dispose a workspace. Refuses while sessions remain unless `force`,
    /// which disposes all of its sessions first.
    pub async fn dispose_workspace(
        &self,
        id: &WorkspaceId,
        force: bool,
    ) -> Result<(), EngineError> {
        if force {
            for session in self.store.sessions_for_workspace(id) {
                self.dispose(&session.id).await?;
            }
        }
        self.workspaces.dispose(id).await?;
        self.store.persist_now().await?;
        Ok(())
    }

    /// Subscribe to terminal output. Returns the chunk channel and a detach
    /// token; at most one consumer is live per session.
    pub fn attach_output(
        &self,
        id: &SessionId,
    ) -> Result<(tokio::sync::mpsc::Receiver<Vec<u8>>, u64), EngineError> {
        let tracker = self.ensure_tracker(id)?;
        Ok(tracker.attach())
    }

    /// Release an output subscription obtained from `attach_output`.
    pub fn detach_output(&self, id: &SessionId, token: u64) {
        if let Some(tracker) = self.trackers.lock().get(id) {
            tracker.detach(token);
        }
    }

    /// Write input bytes to the session's terminal.
    pub async fn send_input(&self, id: &SessionId, bytes: Vec<u8>) -> Result<(), EngineError> {
        let tracker = self.ensure_tracker(id)?;
        tracker.send_input(bytes).await
    }

    /// Resize the session's terminal view.
    pub async fn resize(&self, id: &SessionId, cols: u16, rows: u16) -> Result<(), EngineError> {
        let tracker = {
            let trackers = self.trackers.lock();
            trackers.get(id).cloned()
        };
        match tracker {
            Some(tracker) => tracker.resize(cols, rows).await,
            None => Err(EngineError::NotAttached(id.to_string())),
        }
    }

    /// Subscribe to state-change broadcasts.
    pub fn subscribe_state_changes(&self) -> broadcast::Receiver<StateSnapshot> {
        self.store.subscribe()
    }

    /// Liveness probe for a session.
    pub async fn is_running(&self, id: &SessionId) -> bool {
        self.sessions.is_running(id).await
    }

    /// Reconcile on-disk workspace directories with state.
    pub async fn scan_workspaces(&self) {
        self.workspaces.scan().await;
    }

    /// Restart-time bootstrap: reattach surviving sessions, then reconcile
    /// workspaces and persist the refreshed state.
    pub async fn bootstrap(&self) -> Result<(), EngineError> {
        self.workspaces
            .ensure_root()
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;
        self.sessions.bootstrap().await;
        self.workspaces.scan().await;
        self.store.persist_now().await?;
        Ok(())
    }

    fn ensure_tracker(&self, id: &SessionId) -> Result<Tracker, EngineError> {
        let session = self
            .store
            .get_session(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        let mut trackers = self.trackers.lock();
        if let Some(tracker) = trackers.get(id) {
            return Ok(tracker.clone());
        }

        let tracker = self.start_tracker(&session);
        trackers.insert(id.clone(), tracker.clone());
        Ok(tracker)
    }

    fn start_tracker(&self, session: &Session) -> Tracker {
        Tracker::start(
            self.mux.clone(),
            session.id.clone(),
            session.multiplex_name.clone(),
            self.store.clone(),
            self.config.terminal.width,
            self.config.terminal.height,
            &self.cancel,
        )
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
