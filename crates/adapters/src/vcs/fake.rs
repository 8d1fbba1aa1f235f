// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake VCS adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{DirtyStats, RebaseOutcome, VcsAdapter, VcsError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeVcsState {
    /// Operation log: ("clone", path) etc.
    ops: Vec<(String, PathBuf)>,
    /// Branches reported as checked out in another worktree, per repo URL.
    busy_branches: HashSet<String>,
    /// Canned dirty stats per workspace path.
    dirty: HashMap<PathBuf, DirtyStats>,
    /// Canned ahead/behind per workspace path.
    ahead_behind: HashMap<PathBuf, (u64, u64)>,
    /// Paths whose git operations fail.
    failing: HashSet<PathBuf>,
    /// When set, clone calls time out.
    clone_times_out: bool,
    default_branch: String,
    /// Canned checked-out branch per path (for scan reconciliation).
    branches: HashMap<PathBuf, String>,
    /// Canned origin URL per path.
    remotes: HashMap<PathBuf, String>,
}

/// Fake VCS adapter. Clone and worktree-add create the target directory so
/// downstream path checks behave as in production.
#[derive(Clone)]
pub struct FakeVcs {
    inner: Arc<Mutex<FakeVcsState>>,
}

impl Default for FakeVcs {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeVcsState {
                default_branch: "main".to_string(),
                ..FakeVcsState::default()
            })),
        }
    }
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of operations performed, in order.
    pub fn ops(&self) -> Vec<String> {
        self.inner.lock().ops.iter().map(|(op, _)| op.clone()).collect()
    }

    /// Operations performed against a specific path.
    pub fn ops_for(&self, path: &Path) -> Vec<String> {
        self.inner
            .lock()
            .ops
            .iter()
            .filter(|(_, p)| p == path)
            .map(|(op, _)| op.clone())
            .collect()
    }

    /// Mark a branch as checked out in another worktree.
    pub fn set_branch_busy(&self, branch: &str) {
        self.inner.lock().busy_branches.insert(branch.to_string());
    }

    pub fn set_dirty(&self, path: &Path, stats: DirtyStats) {
        self.inner.lock().dirty.insert(path.to_path_buf(), stats);
    }

    pub fn set_ahead_behind(&self, path: &Path, ahead: u64, behind: u64) {
        self.inner
            .lock()
            .ahead_behind
            .insert(path.to_path_buf(), (ahead, behind));
    }

    /// Make all operations against `path` fail.
    pub fn set_failing(&self, path: &Path) {
        self.inner.lock().failing.insert(path.to_path_buf());
    }

    pub fn set_clone_times_out(&self, times_out: bool) {
        self.inner.lock().clone_times_out = times_out;
    }

    /// Describe an on-disk checkout for scan reconciliation.
    pub fn describe_checkout(&self, path: &Path, remote: &str, branch: &str) {
        let mut state = self.inner.lock();
        state.remotes.insert(path.to_path_buf(), remote.to_string());
        state.branches.insert(path.to_path_buf(), branch.to_string());
    }

    fn record(&self, op: &str, path: &Path) -> Result<(), VcsError> {
        let mut state = self.inner.lock();
        state.ops.push((op.to_string(), path.to_path_buf()));
        if state.failing.contains(path) {
            return Err(VcsError::Failed {
                stderr: format!("injected failure for {}", path.display()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl VcsAdapter for FakeVcs {
    async fn clone_repo(
        &self,
        _repo_url: &str,
        path: &Path,
        _branch: &str,
        timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        if self.inner.lock().clone_times_out {
            self.inner
                .lock()
                .ops
                .push(("clone".to_string(), path.to_path_buf()));
            return Err(VcsError::Timeout(timeout));
        }
        self.record("clone", path)?;
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    async fn worktree_add(
        &self,
        _repo: &Path,
        path: &Path,
        branch: &str,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        if self.inner.lock().busy_branches.contains(branch) {
            self.inner
                .lock()
                .ops
                .push(("worktree_add".to_string(), path.to_path_buf()));
            return Err(VcsError::BranchInUse(branch.to_string()));
        }
        self.record("worktree_add", path)?;
        std::fs::create_dir_all(path)?;
        Ok(())
    }

    async fn fetch(
        &self,
        path: &Path,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        self.record("fetch", path)
    }

    async fn reset_hard(
        &self,
        path: &Path,
        _git_ref: &str,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        self.record("reset_hard", path)
    }

    async fn clean_untracked(
        &self,
        path: &Path,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        self.record("clean_untracked", path)
    }

    async fn ahead(
        &self,
        path: &Path,
        _local_ref: &str,
        _upstream_ref: &str,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<u64, VcsError> {
        self.record("ahead", path)?;
        Ok(self
            .inner
            .lock()
            .ahead_behind
            .get(path)
            .map(|(a, _)| *a)
            .unwrap_or(0))
    }

    async fn behind(
        &self,
        path: &Path,
        _local_ref: &str,
        _upstream_ref: &str,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<u64, VcsError> {
        self.record("behind", path)?;
        Ok(self
            .inner
            .lock()
            .ahead_behind
            .get(path)
            .map(|(_, b)| *b)
            .unwrap_or(0))
    }

    async fn numstat_dirty(
        &self,
        path: &Path,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<DirtyStats, VcsError> {
        self.record("numstat_dirty", path)?;
        Ok(self.inner.lock().dirty.get(path).copied().unwrap_or_default())
    }

    async fn rebase_fast_forward(
        &self,
        path: &Path,
        _onto_ref: &str,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<RebaseOutcome, VcsError> {
        self.record("rebase_fast_forward", path)?;
        Ok(RebaseOutcome {
            fast_forwarded: true,
            conflicts: Vec::new(),
        })
    }

    async fn current_branch(
        &self,
        path: &Path,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<String, VcsError> {
        self.record("current_branch", path)?;
        Ok(self
            .inner
            .lock()
            .branches
            .get(path)
            .cloned()
            .unwrap_or_else(|| "main".to_string()))
    }

    async fn remote_url(
        &self,
        path: &Path,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<String, VcsError> {
        self.record("remote_url", path)?;
        Ok(self
            .inner
            .lock()
            .remotes
            .get(path)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string()))
    }

    async fn detect_default_branch(
        &self,
        path: &Path,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<String, VcsError> {
        self.record("detect_default_branch", path)?;
        Ok(self.inner.lock().default_branch.clone())
    }

    async fn branch_in_use_by_another_worktree(
        &self,
        repo: &Path,
        branch: &str,
        _timeout: Duration,
        _cancel: &CancellationToken,
    ) -> Result<bool, VcsError> {
        self.record("branch_in_use", repo)?;
        Ok(self.inner.lock().busy_branches.contains(branch))
    }
}
