// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git subprocess builder with deadline and cancellation.

use super::VcsError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Builder for a single git invocation.
///
/// Output is always captured. The child is killed when the deadline passes
/// or the cancellation token fires; a killed child never leaves a zombie
/// (`kill_on_drop`).
pub struct GitCommand {
    args: Vec<String>,
    cwd: Option<std::path::PathBuf>,
    timeout: Duration,
}

impl GitCommand {
    pub fn new(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run to completion, requiring exit status 0. Returns trimmed stdout.
    pub async fn run(self, cancel: &CancellationToken) -> Result<String, VcsError> {
        let output = self.output(cancel).await?;
        Ok(output)
    }

    async fn output(self, cancel: &CancellationToken) -> Result<String, VcsError> {
        let mut cmd = Command::new("git");
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Never let a git subprocess block on an interactive prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .kill_on_drop(true);
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }

        let fut = cmd.output();
        let output = tokio::select! {
            result = tokio::time::timeout(self.timeout, fut) => {
                match result {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => return Err(VcsError::Io(e)),
                    Err(_) => {
                        tracing::warn!(args = ?self.args, timeout = ?self.timeout, "git command timed out");
                        return Err(VcsError::Timeout(self.timeout));
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!(args = ?self.args, "git command cancelled");
                return Err(VcsError::Cancelled);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(VcsError::Failed { stderr });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
