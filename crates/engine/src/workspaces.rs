// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace lifecycle: isolated working trees per (repo URL, branch).
//!
//! `get_or_create` is the central operation. The first workspace for a repo
//! is a full clone; later branches of the same repo become linked worktrees
//! sharing its object store, falling back to a clone when the branch is
//! already checked out elsewhere (git forbids the same branch in two
//! worktrees).

use crate::EngineError;
use corral_adapters::{VcsAdapter, VcsError};
use corral_config::Config;
use corral_core::{GitStatus, Workspace, WorkspaceId};
use corral_storage::StateStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Derive a filesystem-safe short name from a repo URL.
///
/// Takes the last path segment, strips a `.git` suffix, lowercases, and
/// replaces anything outside `[a-z0-9_-]` with `-`.
pub fn repo_short_name(repo_url: &str) -> String {
    let tail = repo_url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(repo_url);
    let tail = tail.strip_suffix(".git").unwrap_or(tail);
    let name: String = tail
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if name.is_empty() {
        "repo".to_string()
    } else {
        name
    }
}

/// Manages workspace directories under the workspace root.
#[derive(Clone)]
pub struct WorkspaceManager<V: VcsAdapter> {
    vcs: V,
    store: StateStore,
    config: Arc<Config>,
    root: PathBuf,
    cancel: CancellationToken,
    /// Serializes workspace creation so concurrent spawns for the same
    /// (repo, branch) produce exactly one workspace.
    create_lock: Arc<tokio::sync::Mutex<()>>,
    /// Consecutive git-status failures per workspace, surfaced via logs only.
    status_errors: Arc<Mutex<HashMap<WorkspaceId, u32>>>,
}

impl<V: VcsAdapter> WorkspaceManager<V> {
    pub fn new(
        vcs: V,
        store: StateStore,
        config: Arc<Config>,
        root: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            vcs,
            store,
            config,
            root,
            cancel,
            create_lock: Arc::new(tokio::sync::Mutex::new(())),
            status_errors: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create the workspace root if needed.
    pub fn ensure_root(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    pub fn get_by_id(&self, id: &WorkspaceId) -> Option<Workspace> {
        self.store.get_workspace(id)
    }

    pub fn list(&self) -> Vec<Workspace> {
        self.store.list_workspaces()
    }

    /// Get the workspace for (repo, branch), creating and preparing it on
    /// first use.
    pub async fn get_or_create(
        &self,
        repo_url: &str,
        branch: &str,
    ) -> Result<Workspace, EngineError> {
        // One creation at a time: two concurrent spawns for the same pair
        // must observe each other's workspace.
        let _guard = self.create_lock.lock().await;

        if let Some(existing) = self.store.find_workspace(repo_url, branch) {
            return Ok(existing);
        }

        self.ensure_root()
            .map_err(|e| EngineError::VcsFailed(e.to_string()))?;

        let id = self.allocate_id(repo_url);
        let path = self.root.join(id.as_str());

        match self.provision(repo_url, branch, &path).await {
            Ok(()) => {}
            Err(e) => {
                // Never leave partial state on disk
                let _ = tokio::fs::remove_dir_all(&path).await;
                return Err(e);
            }
        }

        let workspace = Workspace::new(id.clone(), repo_url, branch, path);
        self.store.add_workspace(workspace.clone())?;
        tracing::info!(workspace = %id, repo = repo_url, branch, "workspace created");
        Ok(workspace)
    }

    /// Clone or worktree-add, then prepare the tree.
    async fn provision(&self, repo_url: &str, branch: &str, path: &Path) -> Result<(), EngineError> {
        let clone_timeout = self.config.git_clone_timeout();
        let status_timeout = self.config.git_status_timeout();

        // Prefer a worktree when this repo already has a clone on disk
        let sibling = self
            .store
            .list_workspaces()
            .into_iter()
            .find(|w| w.repo == repo_url);

        let mut provisioned = false;
        if let Some(sibling) = sibling {
            let busy = self
                .vcs
                .branch_in_use_by_another_worktree(&sibling.path, branch, status_timeout, &self.cancel)
                .await
                .unwrap_or(true);

            if busy {
                tracing::debug!(branch, "branch in use, falling back to clone");
            } else {
                match self
                    .vcs
                    .worktree_add(&sibling.path, path, branch, clone_timeout, &self.cancel)
                    .await
                {
                    Ok(()) => provisioned = true,
                    Err(VcsError::BranchInUse(_)) => {
                        tracing::debug!(branch, "worktree add raced a checkout, cloning instead");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if !provisioned {
            self.vcs
                .clone_repo(repo_url, path, branch, clone_timeout, &self.cancel)
                .await?;
        }

        // Prepare: sync with the remote and drop any leftover dirt
        self.vcs.fetch(path, status_timeout, &self.cancel).await?;
        let upstream = format!("origin/{}", branch);
        if let Err(e) = self
            .vcs
            .reset_hard(path, &upstream, status_timeout, &self.cancel)
            .await
        {
            // Local-only branches have no upstream ref
            tracing::debug!(error = %e, branch, "reset to upstream skipped");
        }
        self.vcs
            .clean_untracked(path, status_timeout, &self.cancel)
            .await?;

        Ok(())
    }

    /// Allocate a fresh id: repo short name plus the smallest free counter.
    fn allocate_id(&self, repo_url: &str) -> WorkspaceId {
        let short = repo_short_name(repo_url);
        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", short, n);
            if !self.store.workspace_id_taken(&candidate) && !self.root.join(&candidate).exists() {
                return WorkspaceId::new(candidate);
            }
            n += 1;
        }
    }

    /// Dispose a workspace: refuse while sessions remain, then remove the
    /// directory and the record.
    pub async fn dispose(&self, id: &WorkspaceId) -> Result<(), EngineError> {
        let workspace = self
            .store
            .get_workspace(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        if !self.store.sessions_for_workspace(id).is_empty() {
            return Err(EngineError::WorkspaceHasSessions(id.to_string()));
        }

        if let Err(e) = tokio::fs::remove_dir_all(&workspace.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(workspace = %id, error = %e, "failed to remove workspace dir");
            }
        }
        self.store.remove_workspace(id);
        self.status_errors.lock().remove(id);
        tracing::info!(workspace = %id, "workspace disposed");
        Ok(())
    }

    /// Sample git status for every workspace.
    ///
    /// A failing workspace keeps its previous sampled status; the pass never
    /// fails as a whole.
    pub async fn update_all_git_status(&self) {
        let timeout = self.config.git_status_timeout();

        for workspace in self.store.list_workspaces() {
            if self.cancel.is_cancelled() {
                return;
            }

            match self.sample_git_status(&workspace, timeout).await {
                Ok(status) => {
                    self.status_errors.lock().remove(&workspace.id);
                    let _ = self.store.update_workspace_git_status(&workspace.id, status);
                }
                Err(e) => {
                    let mut errors = self.status_errors.lock();
                    let count = errors.entry(workspace.id.clone()).or_insert(0);
                    *count += 1;
                    tracing::warn!(
                        workspace = %workspace.id,
                        error = %e,
                        consecutive_failures = *count,
                        "git status sample failed, keeping previous"
                    );
                }
            }
        }
    }

    async fn sample_git_status(
        &self,
        workspace: &Workspace,
        timeout: std::time::Duration,
    ) -> Result<GitStatus, EngineError> {
        let upstream = format!("origin/{}", workspace.branch);
        let ahead = self
            .vcs
            .ahead(&workspace.path, "HEAD", &upstream, timeout, &self.cancel)
            .await?;
        let behind = self
            .vcs
            .behind(&workspace.path, "HEAD", &upstream, timeout, &self.cancel)
            .await?;
        let dirty = self
            .vcs
            .numstat_dirty(&workspace.path, timeout, &self.cancel)
            .await?;

        Ok(GitStatus {
            lines_added: dirty.lines_added,
            lines_removed: dirty.lines_removed,
            files_changed: dirty.files_changed,
            ahead,
            behind,
            last_sampled_at: Some(chrono::Utc::now()),
        })
    }

    /// Reconcile on-disk directories with state.
    ///
    /// Unknown directories that look like git checkouts are adopted (repo
    /// and branch read from the tree). Records whose directory is gone are
    /// dropped, unless sessions still reference them.
    pub async fn scan(&self) {
        let timeout = self.config.git_status_timeout();

        // Adopt unknown directories
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() || !path.join(".git").exists() {
                continue;
            }
            let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if self.store.workspace_id_taken(dir_name) {
                continue;
            }

            let repo = match self.vcs.remote_url(&path, timeout, &self.cancel).await {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!(dir = %path.display(), error = %e, "skipping unadoptable dir");
                    continue;
                }
            };
            let branch = match self.vcs.current_branch(&path, timeout, &self.cancel).await {
                Ok(b) => b,
                Err(_) => continue,
            };
            // Invariant: one workspace per (repo, branch)
            if self.store.find_workspace(&repo, &branch).is_some() {
                continue;
            }

            let workspace = Workspace::new(WorkspaceId::new(dir_name), &repo, &branch, path.clone());
            if self.store.add_workspace(workspace).is_ok() {
                tracing::info!(workspace = dir_name, repo, branch, "adopted on-disk workspace");
            }
        }

        // Drop records whose directory vanished
        for workspace in self.store.list_workspaces() {
            if workspace.path.exists() {
                continue;
            }
            if self.store.sessions_for_workspace(&workspace.id).is_empty() {
                tracing::warn!(workspace = %workspace.id, "workspace directory missing, dropping record");
                self.store.remove_workspace(&workspace.id);
            } else {
                tracing::warn!(workspace = %workspace.id, "workspace directory missing but sessions remain");
            }
        }
    }
}

#[cfg(test)]
#[path = "workspaces_tests.rs"]
mod tests;
