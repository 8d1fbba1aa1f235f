// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git adapter built on [`GitCommand`].

use super::{DirtyStats, GitCommand, RebaseOutcome, VcsAdapter, VcsError};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Git-based VCS adapter shelling out to the `git` binary.
#[derive(Clone, Default)]
pub struct GitVcs;

impl GitVcs {
    pub fn new() -> Self {
        Self
    }
}

fn path_str(path: &Path) -> String {
    path.display().to_string()
}

#[async_trait]
impl VcsAdapter for GitVcs {
    async fn clone_repo(
        &self,
        repo_url: &str,
        path: &Path,
        branch: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        // Try the branch-pinned clone first; fall back to a plain clone plus
        // checkout for repos where the branch only exists locally.
        let pinned = GitCommand::new(["clone", "--branch", branch, repo_url, &path_str(path)])
            .timeout(timeout)
            .run(cancel)
            .await;

        match pinned {
            Ok(_) => Ok(()),
            Err(VcsError::Failed { .. }) => {
                GitCommand::new(["clone", repo_url, &path_str(path)])
                    .timeout(timeout)
                    .run(cancel)
                    .await?;
                GitCommand::new(["checkout", branch])
                    .current_dir(path)
                    .timeout(timeout)
                    .run(cancel)
                    .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn worktree_add(
        &self,
        repo: &Path,
        path: &Path,
        branch: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        let result = GitCommand::new(["worktree", "add", &path_str(path), branch])
            .current_dir(repo)
            .timeout(timeout)
            .run(cancel)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(VcsError::Failed { stderr })
                if stderr.contains("already checked out")
                    || stderr.contains("already used by worktree") =>
            {
                Err(VcsError::BranchInUse(branch.to_string()))
            }
            Err(VcsError::Failed { stderr })
                if stderr.contains("invalid reference") || stderr.contains("not a valid ref") =>
            {
                // Branch exists only on the remote: create a local tracking branch
                GitCommand::new([
                    "worktree",
                    "add",
                    "--track",
                    "-b",
                    branch,
                    &path_str(path),
                    &format!("origin/{}", branch),
                ])
                .current_dir(repo)
                .timeout(timeout)
                .run(cancel)
                .await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn fetch(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        GitCommand::new(["fetch", "--prune", "origin"])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await?;
        Ok(())
    }

    async fn reset_hard(
        &self,
        path: &Path,
        git_ref: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        GitCommand::new(["reset", "--hard", git_ref])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await?;
        Ok(())
    }

    async fn clean_untracked(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), VcsError> {
        GitCommand::new(["clean", "-fd"])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await?;
        Ok(())
    }

    async fn ahead(
        &self,
        path: &Path,
        local_ref: &str,
        upstream_ref: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<u64, VcsError> {
        let range = format!("{}..{}", upstream_ref, local_ref);
        let out = GitCommand::new(["rev-list", "--count", &range])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await?;
        Ok(out.parse().unwrap_or(0))
    }

    async fn behind(
        &self,
        path: &Path,
        local_ref: &str,
        upstream_ref: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<u64, VcsError> {
        let range = format!("{}..{}", local_ref, upstream_ref);
        let out = GitCommand::new(["rev-list", "--count", &range])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await?;
        Ok(out.parse().unwrap_or(0))
    }

    async fn numstat_dirty(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<DirtyStats, VcsError> {
        // Staged + unstaged churn against HEAD
        let numstat = GitCommand::new(["diff", "HEAD", "--numstat"])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await?;

        let mut stats = DirtyStats::default();
        for line in numstat.lines() {
            let mut cols = line.split_whitespace();
            let added = cols.next().unwrap_or("0");
            let removed = cols.next().unwrap_or("0");
            // Binary files report "-"; count the file but no lines
            stats.lines_added += added.parse::<u64>().unwrap_or(0);
            stats.lines_removed += removed.parse::<u64>().unwrap_or(0);
        }

        // files_changed counts tracked changes and untracked files alike
        let porcelain = GitCommand::new(["status", "--porcelain"])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await?;
        stats.files_changed = porcelain.lines().filter(|l| !l.is_empty()).count() as u64;

        Ok(stats)
    }

    async fn rebase_fast_forward(
        &self,
        path: &Path,
        onto_ref: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RebaseOutcome, VcsError> {
        let result = GitCommand::new(["rebase", onto_ref])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await;

        match result {
            Ok(_) => Ok(RebaseOutcome {
                fast_forwarded: true,
                conflicts: Vec::new(),
            }),
            Err(VcsError::Failed { .. }) => {
                // Collect conflicting paths before aborting
                let conflicts = GitCommand::new(["diff", "--name-only", "--diff-filter=U"])
                    .current_dir(path)
                    .timeout(timeout)
                    .run(cancel)
                    .await
                    .map(|out| {
                        out.lines()
                            .filter(|l| !l.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();

                let _ = GitCommand::new(["rebase", "--abort"])
                    .current_dir(path)
                    .timeout(timeout)
                    .run(cancel)
                    .await;

                Ok(RebaseOutcome {
                    fast_forwarded: false,
                    conflicts,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn current_branch(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, VcsError> {
        GitCommand::new(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await
    }

    async fn remote_url(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, VcsError> {
        GitCommand::new(["remote", "get-url", "origin"])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await
    }

    async fn detect_default_branch(
        &self,
        path: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String, VcsError> {
        let symref = GitCommand::new(["symbolic-ref", "--short", "refs/remotes/origin/HEAD"])
            .current_dir(path)
            .timeout(timeout)
            .run(cancel)
            .await;

        match symref {
            Ok(name) => Ok(name.trim_start_matches("origin/").to_string()),
            Err(VcsError::Failed { .. }) => {
                // No upstream HEAD recorded: fall back to the local HEAD branch
                let head = GitCommand::new(["symbolic-ref", "--short", "HEAD"])
                    .current_dir(path)
                    .timeout(timeout)
                    .run(cancel)
                    .await?;
                Ok(head)
            }
            Err(e) => Err(e),
        }
    }

    async fn branch_in_use_by_another_worktree(
        &self,
        repo: &Path,
        branch: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, VcsError> {
        let out = GitCommand::new(["worktree", "list", "--porcelain"])
            .current_dir(repo)
            .timeout(timeout)
            .run(cancel)
            .await?;

        let wanted = format!("branch refs/heads/{}", branch);
        Ok(out.lines().any(|l| l.trim() == wanted))
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
