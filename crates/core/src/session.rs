// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session record: one agent process inside one multiplexer window.

use crate::workspace::WorkspaceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for an agent session: `<workspace_id>-<8hex>`.
    pub struct SessionId;
}

/// One live agent process attached to one multiplexer session.
///
/// Serialized shape is the persisted wire contract (snake_case, RFC3339).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    /// Agent or user-defined promptable name this session runs.
    pub target: String,
    /// Verbatim prompt passed to the agent's CLI.
    pub prompt: String,
    /// Optional human name; when set it drives the multiplexer session name.
    #[serde(default)]
    pub nickname: String,
    /// Multiplexer session identifier currently in use (sanitized).
    pub multiplex_name: String,
    /// Cached PID of the top-of-pane process; 0 when unknown.
    #[serde(default)]
    pub pid: u32,
    pub created_at: DateTime<Utc>,
    /// Most recent meaningful output. Monotonically non-decreasing.
    pub last_output_at: DateTime<Utc>,
    /// Latest classifier result as an opaque JSON string, or empty.
    #[serde(default)]
    pub classification: String,
}

impl Session {
    /// Derive a session id for a workspace: `<workspace_id>-<8hex>`.
    pub fn derive_id(workspace_id: &WorkspaceId) -> SessionId {
        SessionId::new(format!("{}-{}", workspace_id, crate::id::short_suffix()))
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
