// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target resolution: mapping a target name to a concrete agent command.
//!
//! A target names either a built-in agent binary (`claude`, `codex`,
//! `gemini`), a model alias (`claude:opus` — base tool plus an env
//! override), or a user-defined promptable command from config. Resolution
//! is a pure function; the orchestrator only consumes the resolved view.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Built-in agent binaries, in resolution order.
const BUILTIN_AGENTS: &[&str] = &["claude", "codex", "gemini"];

/// Env var that selects the model for each built-in tool.
fn model_env_var(tool: &str) -> Option<&'static str> {
    match tool {
        "claude" => Some("ANTHROPIC_MODEL"),
        "codex" => Some("CODEX_MODEL"),
        "gemini" => Some("GEMINI_MODEL"),
        _ => None,
    }
}

/// A user-defined target definition as it appears in config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetDef {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Whether the command accepts a prompt argument.
    #[serde(default = "default_promptable")]
    pub promptable: bool,
}

fn default_promptable() -> bool {
    true
}

/// How a target name resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Builtin,
    ModelAlias,
    UserDefined,
}

/// The resolved view of a target the orchestrator consumes.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub name: String,
    pub kind: TargetKind,
    pub command: String,
    pub env: Vec<(String, String)>,
    pub promptable: bool,
}

/// Resolve a target name against the user-defined target table.
///
/// User-defined targets shadow built-ins of the same name. `tool:model`
/// aliases resolve only for built-in tools. Returns `None` for unknown names.
pub fn resolve_target(user_targets: &[TargetDef], name: &str) -> Option<ResolvedTarget> {
    if let Some(def) = user_targets.iter().find(|t| t.name == name) {
        let mut env: Vec<(String, String)> = def.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        env.sort();
        return Some(ResolvedTarget {
            name: def.name.clone(),
            kind: TargetKind::UserDefined,
            command: def.command.clone(),
            env,
            promptable: def.promptable,
        });
    }

    if BUILTIN_AGENTS.contains(&name) {
        return Some(ResolvedTarget {
            name: name.to_string(),
            kind: TargetKind::Builtin,
            command: name.to_string(),
            env: Vec::new(),
            promptable: true,
        });
    }

    // Model alias: `tool:model` with a built-in base tool.
    if let Some((tool, model)) = name.split_once(':') {
        if BUILTIN_AGENTS.contains(&tool) && !model.is_empty() {
            let var = model_env_var(tool)?;
            return Some(ResolvedTarget {
                name: name.to_string(),
                kind: TargetKind::ModelAlias,
                command: tool.to_string(),
                env: vec![(var.to_string(), model.to_string())],
                promptable: true,
            });
        }
    }

    None
}

#[cfg(test)]
#[path = "target_tests.rs"]
mod tests;
