// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot runner: invoke a target once with a prompt, return its stdout.
//!
//! Used by the classifier loop. The invocation is a black box from the
//! orchestrator's point of view: structured-output plumbing is the target
//! command's concern; the schema file path is handed over in the
//! environment.

use async_trait::async_trait;
use corral_core::{shell_single_quote, ResolvedTarget};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Env var pointing the target at its structured-output schema file.
pub const SCHEMA_FILE_ENV: &str = "CORRAL_SCHEMA_FILE";

/// Errors from one-shot invocations
#[derive(Debug, Error)]
pub enum OneshotError {
    #[error("one-shot timed out after {0:?}")]
    Timeout(Duration),
    #[error("one-shot failed: {stderr}")]
    Failed { stderr: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs a resolved target once and returns its raw stdout.
#[async_trait]
pub trait OneshotRunner: Clone + Send + Sync + 'static {
    async fn run(
        &self,
        target: &ResolvedTarget,
        prompt: &str,
        schema_file: &Path,
        timeout: Duration,
        cwd: &Path,
    ) -> Result<String, OneshotError>;
}

/// Subprocess-backed one-shot runner.
#[derive(Clone, Default)]
pub struct CommandOneshot;

impl CommandOneshot {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OneshotRunner for CommandOneshot {
    async fn run(
        &self,
        target: &ResolvedTarget,
        prompt: &str,
        schema_file: &Path,
        timeout: Duration,
        cwd: &Path,
    ) -> Result<String, OneshotError> {
        let command_line = format!("{} {}", target.command, shell_single_quote(prompt));

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command_line)
            .current_dir(cwd)
            .env(SCHEMA_FILE_ENV, schema_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &target.env {
            cmd.env(key, value);
        }

        let output = tokio::time::timeout(timeout, cmd.output())
            .await
            .map_err(|_| OneshotError::Timeout(timeout))??;

        if !output.status.success() {
            return Err(OneshotError::Failed {
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded one-shot invocation
    #[derive(Debug, Clone)]
    pub struct OneshotCall {
        pub target: String,
        pub prompt: String,
        pub cwd: std::path::PathBuf,
    }

    /// Fake one-shot runner returning a canned response, optionally after a delay.
    #[derive(Clone)]
    pub struct FakeOneshot {
        response: String,
        delay: Duration,
        calls: Arc<Mutex<Vec<OneshotCall>>>,
    }

    impl FakeOneshot {
        pub fn new(response: impl Into<String>) -> Self {
            Self {
                response: response.into(),
                delay: Duration::ZERO,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn calls(&self) -> Vec<OneshotCall> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl OneshotRunner for FakeOneshot {
        async fn run(
            &self,
            target: &ResolvedTarget,
            prompt: &str,
            _schema_file: &Path,
            _timeout: Duration,
            cwd: &Path,
        ) -> Result<String, OneshotError> {
            self.calls.lock().push(OneshotCall {
                target: target.name.clone(),
                prompt: prompt.to_string(),
                cwd: cwd.to_path_buf(),
            });
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.response.clone())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeOneshot, OneshotCall};

#[cfg(test)]
#[path = "oneshot_tests.rs"]
mod tests;
