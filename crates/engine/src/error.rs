// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error kinds.
//!
//! User-facing operations fail fast with one of these kinds; the outer HTTP
//! layer maps kinds to status codes. Background loops never surface errors
//! to callers.

use corral_adapters::{MuxError, VcsError};
use corral_storage::StoreError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("name already in use: {0}")]
    NameConflict(String),

    #[error("vcs operation timed out after {0:?}")]
    VcsTimeout(Duration),

    #[error("vcs operation failed: {0}")]
    VcsFailed(String),

    #[error("branch already checked out in another worktree: {0}")]
    BranchInUse(String),

    #[error("session has no attached tracker: {0}")]
    NotAttached(String),

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("state store busy: {0}")]
    StoreBusy(String),

    #[error("workspace has live sessions: {0}")]
    WorkspaceHasSessions(String),
}

impl From<VcsError> for EngineError {
    fn from(e: VcsError) -> Self {
        match e {
            VcsError::Timeout(d) => EngineError::VcsTimeout(d),
            VcsError::BranchInUse(b) => EngineError::BranchInUse(b),
            VcsError::Failed { stderr } => EngineError::VcsFailed(stderr),
            VcsError::Cancelled => EngineError::VcsFailed("cancelled".to_string()),
            VcsError::Io(e) => EngineError::VcsFailed(e.to_string()),
        }
    }
}

impl From<MuxError> for EngineError {
    fn from(e: MuxError) -> Self {
        match e {
            MuxError::NameInUse(n) => EngineError::NameConflict(n),
            MuxError::NotFound(n) => EngineError::NotFound(n),
            MuxError::SpawnFailed(m) | MuxError::CommandFailed(m) => EngineError::SpawnFailed(m),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::WorkspaceNotFound(id) | StoreError::SessionNotFound(id) => {
                EngineError::NotFound(id)
            }
            StoreError::DuplicateRepoBranch { repo, branch } => {
                EngineError::NameConflict(format!("{repo}#{branch}"))
            }
            e @ (StoreError::Io(_) | StoreError::Json(_) | StoreError::Busy(_)) => {
                EngineError::StoreBusy(e.to_string())
            }
        }
    }
}
