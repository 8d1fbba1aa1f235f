// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inactivity classification: "what state is this agent in?"
//!
//! When a session goes quiet, the classifier extracts the agent's latest
//! response from the session log, hands it to a one-shot target together
//! with a fixed schema label, and stores the raw JSON result on the
//! session record.

use crate::chunk::strip_controls;
use crate::EngineError;
use corral_adapters::OneshotRunner;
use corral_config::{Config, StatePaths};
use corral_core::{resolve_target, Session};
use corral_storage::StateStore;
use std::sync::Arc;
use std::time::Duration;

/// Schema label for classification results.
pub const SCHEMA_LABEL: &str = "agent_state";

/// JSON schema written to `STATE/schemas/agent_state.json` at boot.
pub const AGENT_STATE_SCHEMA: &str = r#"{
  "type": "object",
  "properties": {
    "state": {
      "type": "string",
      "enum": ["Working", "Idle", "NeedsInput", "Done", "Stuck"]
    },
    "summary": { "type": "string" }
  },
  "required": ["state"]
}"#;

/// Prompt markers agent CLIs render when waiting at an input line.
const PROMPT_MARKERS: [char; 2] = ['\u{276f}', '\u{203a}']; // ❯ ›

/// Non-empty lines collected before the prompt marker.
const MAX_CONTEXT_LINES: usize = 80;

/// Log bytes read from the tail of the session log.
const LOG_TAIL_BYTES: u64 = 64 * 1024;

/// Per-invocation budget for the one-shot target.
const ONESHOT_TIMEOUT: Duration = Duration::from_secs(60);

/// Extract the agent's latest response from raw log content.
///
/// Finds the last line carrying a prompt marker, takes up to
/// [`MAX_CONTEXT_LINES`] non-empty lines before it, and appends any
/// trailing choice-menu lines after it. Control sequences are stripped
/// first. Falls back to the last lines of the log when no marker exists.
pub fn extract_latest_response(log_content: &str) -> String {
    let stripped = strip_controls(log_content.as_bytes());
    let text = String::from_utf8_lossy(&stripped).into_owned();
    let lines: Vec<&str> = text.lines().collect();

    let marker_idx = lines
        .iter()
        .rposition(|line| line.chars().any(|c| PROMPT_MARKERS.contains(&c)));

    match marker_idx {
        Some(idx) => {
            let mut collected: Vec<&str> = lines[..idx]
                .iter()
                .filter(|l| !l.trim().is_empty())
                .copied()
                .collect();
            if collected.len() > MAX_CONTEXT_LINES {
                collected.drain(..collected.len() - MAX_CONTEXT_LINES);
            }
            // Trailing choice-menu lines after the marker
            collected.extend(lines[idx..].iter().filter(|l| !l.trim().is_empty()));
            collected.join("\n")
        }
        None => {
            let non_empty: Vec<&str> = lines.iter().filter(|l| !l.trim().is_empty()).copied().collect();
            let start = non_empty.len().saturating_sub(MAX_CONTEXT_LINES);
            non_empty[start..].join("\n")
        }
    }
}

/// Runs classifications against the configured one-shot target.
#[derive(Clone)]
pub struct Classifier<O: OneshotRunner> {
    runner: O,
    store: StateStore,
    config: Arc<Config>,
    paths: StatePaths,
}

impl<O: OneshotRunner> Classifier<O> {
    pub fn new(runner: O, store: StateStore, config: Arc<Config>, paths: StatePaths) -> Self {
        Self {
            runner,
            store,
            config,
            paths,
        }
    }

    pub fn runner(&self) -> &O {
        &self.runner
    }

    /// Write the schema files the classifier addresses by label.
    pub fn write_schemas(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.paths.schemas_dir)?;
        std::fs::write(self.paths.schema_file(SCHEMA_LABEL), AGENT_STATE_SCHEMA)?;
        Ok(())
    }

    /// Classify one session and store the raw result.
    pub async fn classify(&self, session: &Session) -> Result<(), EngineError> {
        let target = resolve_target(&self.config.targets, &self.config.classifier.target)
            .ok_or_else(|| {
                EngineError::NotFound(format!("classifier target: {}", self.config.classifier.target))
            })?;

        let log_path = self.paths.session_log(session.id.as_str());
        let tail = read_log_tail(&log_path, LOG_TAIL_BYTES)
            .map_err(|e| EngineError::SpawnFailed(format!("log read: {e}")))?;
        let latest = extract_latest_response(&tail);

        let prompt = format!(
            "You are watching a coding agent's terminal session. Below is the \
             agent's latest visible output. Decide what state the agent is in \
             and answer as JSON matching the provided schema.\n\n---\n{}\n---",
            latest
        );

        let cwd = self
            .store
            .get_workspace(&session.workspace_id)
            .map(|w| w.path)
            .unwrap_or_else(|| self.paths.state_dir.clone());

        let result = self
            .runner
            .run(
                &target,
                &prompt,
                &self.paths.schema_file(SCHEMA_LABEL),
                ONESHOT_TIMEOUT,
                &cwd,
            )
            .await
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;

        self.store.update_session_classification(&session.id, result);
        Ok(())
    }
}

/// Read at most `max_bytes` from the end of a log file.
fn read_log_tail(path: &std::path::Path, max_bytes: u64) -> std::io::Result<String> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    if len > max_bytes {
        file.seek(SeekFrom::Start(len - max_bytes))?;
    }
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod tests;
