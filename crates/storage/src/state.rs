// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-process state store.
//!
//! Single owner of workspace and session records. All reads go through the
//! read lock and return deep copies; all writes go through the write lock,
//! then mark the store dirty for the debounced persister and broadcast a
//! fresh snapshot to subscribers.
//!
//! The on-disk form is the [`StateSnapshot`] itself, staged to a sibling
//! file and renamed into place so a crash never exposes a partial write. A
//! state file that no longer parses is quarantined at boot instead of
//! keeping the daemon down.

use chrono::{DateTime, Utc};
use corral_core::{GitStatus, Session, SessionId, Workspace, WorkspaceId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// How long writes are coalesced before hitting disk.
const PERSIST_DEBOUNCE: Duration = Duration::from_millis(500);

/// Persist attempts before giving up with [`StoreError::Busy`].
const PERSIST_RETRIES: u32 = 3;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("workspace already exists for {repo}#{branch}")]
    DuplicateRepoBranch { repo: String, branch: String },
    #[error("state file IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("persist failed after retries: {0}")]
    Busy(String),
}

/// Deep-copied view handed to subscribers and external callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub workspaces: Vec<Workspace>,
    pub sessions: Vec<Session>,
}

#[derive(Default)]
struct StoreInner {
    workspaces: HashMap<WorkspaceId, Workspace>,
    sessions: HashMap<SessionId, Session>,
}

/// The state store. Cheap to clone; all clones share the same state.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<RwLock<StoreInner>>,
    path: Arc<PathBuf>,
    dirty_tx: watch::Sender<u64>,
    change_tx: broadcast::Sender<StateSnapshot>,
}

impl StateStore {
    /// Open the store, loading any existing snapshot from `path`.
    pub fn open(path: PathBuf) -> Result<Self, StoreError> {
        let mut inner = StoreInner::default();
        if let Some(snapshot) = read_state_file(&path)? {
            for ws in snapshot.workspaces {
                inner.workspaces.insert(ws.id.clone(), ws);
            }
            for session in snapshot.sessions {
                inner.sessions.insert(session.id.clone(), session);
            }
        }

        let (dirty_tx, _) = watch::channel(0u64);
        let (change_tx, _) = broadcast::channel(64);
        Ok(Self {
            inner: Arc::new(RwLock::new(inner)),
            path: Arc::new(path),
            dirty_tx,
            change_tx,
        })
    }

    /// In-memory store for tests; persists into the given directory.
    pub fn open_in(dir: &Path) -> Result<Self, StoreError> {
        Self::open(dir.join("state.json"))
    }

    // -- workspace operations --

    /// Add a workspace. At most one workspace may exist per (repo, branch).
    pub fn add_workspace(&self, workspace: Workspace) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write();
            if inner
                .workspaces
                .values()
                .any(|w| w.repo == workspace.repo && w.branch == workspace.branch)
            {
                return Err(StoreError::DuplicateRepoBranch {
                    repo: workspace.repo.clone(),
                    branch: workspace.branch.clone(),
                });
            }
            inner.workspaces.insert(workspace.id.clone(), workspace);
        }
        self.after_write();
        Ok(())
    }

    pub fn remove_workspace(&self, id: &WorkspaceId) -> Option<Workspace> {
        let removed = self.inner.write().workspaces.remove(id);
        if removed.is_some() {
            self.after_write();
        }
        removed
    }

    pub fn update_workspace_git_status(
        &self,
        id: &WorkspaceId,
        status: GitStatus,
    ) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write();
            let ws = inner
                .workspaces
                .get_mut(id)
                .ok_or_else(|| StoreError::WorkspaceNotFound(id.to_string()))?;
            ws.git_status = status;
        }
        self.after_write();
        Ok(())
    }

    pub fn get_workspace(&self, id: &WorkspaceId) -> Option<Workspace> {
        self.inner.read().workspaces.get(id).cloned()
    }

    /// Find the live workspace for a (repo, branch) pair.
    pub fn find_workspace(&self, repo: &str, branch: &str) -> Option<Workspace> {
        self.inner
            .read()
            .workspaces
            .values()
            .find(|w| w.repo == repo && w.branch == branch)
            .cloned()
    }

    pub fn list_workspaces(&self) -> Vec<Workspace> {
        let mut workspaces: Vec<Workspace> =
            self.inner.read().workspaces.values().cloned().collect();
        workspaces.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        workspaces
    }

    /// Whether a workspace id is already taken.
    pub fn workspace_id_taken(&self, id: &str) -> bool {
        self.inner.read().workspaces.contains_key(id)
    }

    // -- session operations --

    pub fn add_session(&self, session: Session) {
        self.inner.write().sessions.insert(session.id.clone(), session);
        self.after_write();
    }

    /// Replace a session record wholesale.
    pub fn update_session(&self, session: Session) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write();
            if !inner.sessions.contains_key(&session.id) {
                return Err(StoreError::SessionNotFound(session.id.to_string()));
            }
            inner.sessions.insert(session.id.clone(), session);
        }
        self.after_write();
        Ok(())
    }

    pub fn remove_session(&self, id: &SessionId) -> Option<Session> {
        let removed = self.inner.write().sessions.remove(id);
        if removed.is_some() {
            self.after_write();
        }
        removed
    }

    /// Advance a session's last-output timestamp. Never moves backwards.
    pub fn update_session_last_output(&self, id: &SessionId, t: DateTime<Utc>) {
        let mut changed = false;
        {
            let mut inner = self.inner.write();
            if let Some(session) = inner.sessions.get_mut(id) {
                if t > session.last_output_at {
                    session.last_output_at = t;
                    changed = true;
                }
            }
        }
        if changed {
            self.after_write();
        }
    }

    pub fn update_session_classification(&self, id: &SessionId, classification: String) {
        let mut changed = false;
        {
            let mut inner = self.inner.write();
            if let Some(session) = inner.sessions.get_mut(id) {
                session.classification = classification;
                changed = true;
            }
        }
        if changed {
            self.after_write();
        }
    }

    pub fn clear_session_classification(&self, id: &SessionId) {
        self.update_session_classification(id, String::new());
    }

    pub fn get_session(&self, id: &SessionId) -> Option<Session> {
        self.inner.read().sessions.get(id).cloned()
    }

    pub fn list_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.inner.read().sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        sessions
    }

    pub fn sessions_for_workspace(&self, workspace_id: &WorkspaceId) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .inner
            .read()
            .sessions
            .values()
            .filter(|s| &s.workspace_id == workspace_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        sessions
    }

    /// Whether a multiplexer name is used by any live session.
    pub fn multiplex_name_taken(&self, name: &str) -> bool {
        self.inner
            .read()
            .sessions
            .values()
            .any(|s| s.multiplex_name == name)
    }

    // -- snapshots, persistence, notifications --

    /// Deep-copied snapshot of everything.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            workspaces: self.list_workspaces(),
            sessions: self.list_sessions(),
        }
    }

    /// Subscribe to state changes. Each write broadcasts a fresh snapshot.
    pub fn subscribe(&self) -> broadcast::Receiver<StateSnapshot> {
        self.change_tx.subscribe()
    }

    /// Force a synchronous save, retrying before reporting [`StoreError::Busy`].
    pub async fn persist_now(&self) -> Result<(), StoreError> {
        let mut last_err = String::new();
        for attempt in 1..=PERSIST_RETRIES {
            match self.save() {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "state persist failed");
                    last_err = e.to_string();
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        }
        Err(StoreError::Busy(last_err))
    }

    /// Spawn the debounced persister. Writes coalesce for
    /// [`PERSIST_DEBOUNCE`]; cancellation triggers a final save.
    pub fn spawn_persister(&self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        let mut dirty_rx = self.dirty_tx.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        if let Err(e) = store.persist_now().await {
                            tracing::warn!(error = %e, "final persist on shutdown failed");
                        }
                        break;
                    }
                    changed = dirty_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        tokio::time::sleep(PERSIST_DEBOUNCE).await;
                        // Absorb every mark that arrived during the debounce window
                        dirty_rx.mark_unchanged();
                        if let Err(e) = store.persist_now().await {
                            tracing::warn!(error = %e, "debounced persist failed");
                        }
                    }
                }
            }
        })
    }

    /// Write the snapshot to disk: stage a sibling file, fsync, rename.
    ///
    /// Staging next to the target keeps the rename on one filesystem, which
    /// is what makes it atomic. The snapshot is taken under the read lock;
    /// serialization and IO happen outside it.
    fn save(&self) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        let payload = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let staging = staging_path(&self.path);
        let mut file = std::fs::File::create(&staging)?;
        file.write_all(&payload)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&staging, self.path.as_ref())?;

        Ok(())
    }

    fn after_write(&self) {
        self.dirty_tx.send_modify(|generation| *generation += 1);
        // No receivers is fine; the dashboard may not be connected
        let _ = self.change_tx.send(self.snapshot());
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

/// Read the persisted snapshot, if any.
///
/// A file that no longer parses is moved aside to `state.json.corrupt`
/// (replacing any earlier quarantine) so the daemon boots with empty state
/// instead of refusing to start.
fn read_state_file(path: &Path) -> Result<Option<StateSnapshot>, StoreError> {
    let content = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&content) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            let quarantine = quarantine_path(path);
            tracing::warn!(
                error = %e,
                path = %path.display(),
                quarantine = %quarantine.display(),
                "state file unreadable, quarantining and starting empty",
            );
            std::fs::rename(path, &quarantine)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
