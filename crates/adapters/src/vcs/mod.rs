// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version-control adapters

mod command;
mod git;

pub use command::GitCommand;
pub use git::GitVcs;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeVcs;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors from VCS operations
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("vcs operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("vcs operation cancelled")]
    Cancelled,
    #[error("vcs operation failed: {stderr}")]
    Failed { stderr: String },
    #[error("branch already checked out in another worktree: {0}")]
    BranchInUse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Working-tree dirt, from `diff --numstat` plus untracked accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyStats {
    pub lines_added: u64,
    pub lines_removed: u64,
    pub files_changed: u64,
}

/// Result of a fast-forward-preferring rebase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebaseOutcome {
    pub fast_forwarded: bool,
    /// Conflicting paths when the rebase had to be aborted.
    pub conflicts: Vec<String>,
}

/// Adapter over a version control system.
///
/// Only the subset needed for branch prep and status sampling. Every
/// operation takes a deadline and a cancellation token; the running child
/// process is killed when either fires.
#[async_trait]
pub trait VcsAdapter: Clone + Send + Sync + 'static {
    /// Clone `repo_url` into `path` and check out `branch`.
    async fn clone_repo(
        &self,
        repo_url: &str,
        path: &Path,
        branch: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError>;

    /// Add a linked worktree for `branch` at `path`, sharing `repo`'s object store.
    async fn worktree_add(
        &self,
        repo: &Path,
        path: &Path,
        branch: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError>;

    async fn fetch(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError>;

    async fn reset_hard(
        &self,
        path: &Path,
        git_ref: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError>;

    async fn clean_untracked(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError>;

    /// Commits on `local_ref` not on `upstream_ref`.
    async fn ahead(
        &self,
        path: &Path,
        local_ref: &str,
        upstream_ref: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<u64, VcsError>;

    /// Commits on `upstream_ref` not on `local_ref`.
    async fn behind(
        &self,
        path: &Path,
        local_ref: &str,
        upstream_ref: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<u64, VcsError>;

    /// Uncommitted line/file churn against HEAD.
    async fn numstat_dirty(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DirtyStats, VcsError>;

    /// Rebase onto `onto_ref`, aborting on conflicts.
    async fn rebase_fast_forward(
        &self,
        path: &Path,
        onto_ref: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RebaseOutcome, VcsError>;

    /// Branch currently checked out at `path`.
    async fn current_branch(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, VcsError>;

    /// URL of the `origin` remote at `path`.
    async fn remote_url(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, VcsError>;

    /// Upstream HEAD symref, falling back to the local HEAD branch.
    async fn detect_default_branch(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, VcsError>;

    /// Whether `branch` is checked out in any worktree linked to `repo`.
    async fn branch_in_use_by_another_worktree(
        &self,
        repo: &Path,
        branch: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, VcsError>;
}
