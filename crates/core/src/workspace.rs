// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace record and derived git facts.
//!
//! A workspace is one isolated working tree on disk for a (repo URL, branch)
//! pair. The id doubles as the directory name under the workspace root.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a workspace.
    ///
    /// Filesystem-safe by construction: repo short name plus a counter
    /// (`api-1`, `api-2`). Also the directory name under the workspace root.
    pub struct WorkspaceId;
}

/// Sampled git facts for a workspace. Derived, never authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitStatus {
    #[serde(rename = "git_lines_added")]
    pub lines_added: u64,
    #[serde(rename = "git_lines_removed")]
    pub lines_removed: u64,
    #[serde(rename = "git_files_changed")]
    pub files_changed: u64,
    #[serde(rename = "git_ahead")]
    pub ahead: u64,
    #[serde(rename = "git_behind")]
    pub behind: u64,
    /// When this status was last sampled. Not part of the wire contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sampled_at: Option<DateTime<Utc>>,
}

/// One isolated working directory for a (repo URL, branch) pair.
///
/// Serialized shape is the persisted wire contract: snake_case fields,
/// RFC3339 timestamps, git status fields flattened with a `git_` prefix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub repo: String,
    pub branch: String,
    pub path: PathBuf,
    #[serde(flatten)]
    pub git_status: GitStatus,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(
        id: WorkspaceId,
        repo: impl Into<String>,
        branch: impl Into<String>,
        path: PathBuf,
    ) -> Self {
        Self {
            id,
            repo: repo.into(),
            branch: branch.into(),
            path,
            git_status: GitStatus::default(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
